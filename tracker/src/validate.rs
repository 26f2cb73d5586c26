use crate::errors::{Error, Result};
use crate::model::NewPosition;
use crate::payload::{AccelerationReport, CoordinatesReport, StatusReport};

const LATITUDE_MIN: f64 = -90.0;
const LATITUDE_MAX: f64 = 90.0;
const LONGITUDE_MIN: f64 = -180.0;
const LONGITUDE_MAX: f64 = 180.0;

/// Range and sanity rules applied after a report has been decoded
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for StatusReport {
    fn validate(&self) -> Result<()> {
        validate_imei(&self.imei)
    }
}

impl Validate for CoordinatesReport {
    fn validate(&self) -> Result<()> {
        validate_imei(&self.imei)?;
        validate_fix(self.latitude, self.longitude, self.altitude, self.utc)
    }
}

impl Validate for NewPosition {
    fn validate(&self) -> Result<()> {
        validate_fix(self.latitude, self.longitude, Some(self.altitude), self.utc)
    }
}

impl Validate for AccelerationReport {
    fn validate(&self) -> Result<()> {
        validate_imei(&self.imei)?;
        validate_finite("x", self.x)?;
        validate_finite("y", self.y)?;
        validate_finite("z", self.z)?;
        validate_utc(self.utc)
    }
}

fn validate_fix(latitude: f64, longitude: f64, altitude: Option<f64>, utc: i64) -> Result<()> {
    if !(LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude) {
        return Err(Error::Validation(format!(
            "Latitude {} out of range [{}, {}]",
            latitude, LATITUDE_MIN, LATITUDE_MAX
        )));
    }

    if !(LONGITUDE_MIN..=LONGITUDE_MAX).contains(&longitude) {
        return Err(Error::Validation(format!(
            "Longitude {} out of range [{}, {}]",
            longitude, LONGITUDE_MIN, LONGITUDE_MAX
        )));
    }

    if let Some(altitude) = altitude {
        validate_finite("altitude", altitude)?;
    }

    validate_utc(utc)
}

fn validate_imei(imei: &str) -> Result<()> {
    if imei.trim().is_empty() {
        return Err(Error::Validation("IMEI cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_finite(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::Validation(format!("{field} must be finite")));
    }
    Ok(())
}

fn validate_utc(utc: i64) -> Result<()> {
    if utc < 0 {
        return Err(Error::Validation(format!("utc {utc} is before the epoch")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates(latitude: f64, longitude: f64) -> CoordinatesReport {
        CoordinatesReport {
            imei: "123".to_string(),
            latitude,
            longitude,
            altitude: None,
            utc: 1000,
        }
    }

    #[test]
    fn test_valid_coordinates() {
        assert!(coordinates(47.37, 8.54).validate().is_ok());
        assert!(coordinates(-90.0, 180.0).validate().is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        assert!(coordinates(90.5, 0.0).validate().is_err());
    }

    #[test]
    fn test_new_position_uses_same_ranges() {
        let mut position = NewPosition {
            latitude: 47.37,
            longitude: 8.54,
            altitude: 400.0,
            utc: 1000,
            device: uuid::Uuid::nil(),
        };
        assert!(position.validate().is_ok());

        position.latitude = -91.0;
        assert!(position.validate().is_err());

        position.latitude = 0.0;
        position.altitude = f64::NAN;
        assert!(position.validate().is_err());
    }

    #[test]
    fn test_invalid_longitude() {
        assert!(coordinates(0.0, -181.0).validate().is_err());
    }

    #[test]
    fn test_negative_utc() {
        let mut report = coordinates(0.0, 0.0);
        report.utc = -1;
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_empty_imei() {
        let report = StatusReport {
            imei: "  ".to_string(),
            ip: "10.0.0.1".to_string(),
            inputs: 0,
            outputs: 0,
            led: 0,
            button: 0,
        };

        assert!(report.validate().is_err());
    }

    #[test]
    fn test_acceleration_not_finite() {
        let report = AccelerationReport {
            imei: "123".to_string(),
            x: f64::NAN,
            y: 0.0,
            z: 0.0,
            status: 0,
            utc: 0,
        };

        assert!(report.validate().is_err());
    }
}
