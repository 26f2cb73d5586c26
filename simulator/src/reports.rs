use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest step of the random walk, in degrees
const MAX_STEP: f64 = 0.0005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub imei: String,
    pub ip: String,
    pub inputs: i32,
    pub outputs: i32,
    pub led: i32,
    pub button: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatesReport {
    pub imei: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub utc: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccelerationReport {
    pub imei: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub status: i32,
    pub utc: i64,
}

/// A tracker wandering around its starting point
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub imei: String,
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

impl SimulatedDevice {
    pub fn new(imei: String, latitude: f64, longitude: f64) -> Self {
        Self {
            imei,
            latitude,
            longitude,
            altitude: 0.0,
        }
    }

    pub fn coordinates_topic(&self) -> String {
        format!("gps/coordinates/{}", self.imei)
    }

    pub fn status_topic(&self) -> String {
        format!("device/status/{}", self.imei)
    }

    pub fn acceleration_topic(&self) -> String {
        format!("sensors/acceleration/{}", self.imei)
    }

    pub fn step(&mut self, rng: &mut impl Rng) -> CoordinatesReport {
        self.latitude = (self.latitude + rng.gen_range(-MAX_STEP..MAX_STEP)).clamp(-90.0, 90.0);
        self.longitude =
            (self.longitude + rng.gen_range(-MAX_STEP..MAX_STEP)).clamp(-180.0, 180.0);
        self.altitude = (self.altitude + rng.gen_range(-1.0..1.0)).max(0.0);

        CoordinatesReport {
            imei: self.imei.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            utc: Utc::now().timestamp_millis(),
        }
    }

    pub fn status(&self, rng: &mut impl Rng) -> StatusReport {
        StatusReport {
            imei: self.imei.clone(),
            ip: format!("10.0.{}.{}", rng.gen_range(0..=255), rng.gen_range(1..=254)),
            inputs: rng.gen_range(0..16),
            outputs: rng.gen_range(0..16),
            led: rng.gen_range(0..=1),
            // 5% of reports carry a button press
            button: i32::from(rng.gen_bool(0.05)),
        }
    }

    pub fn acceleration(&self, rng: &mut impl Rng) -> AccelerationReport {
        AccelerationReport {
            imei: self.imei.clone(),
            x: rng.gen_range(-2.0..2.0),
            y: rng.gen_range(-2.0..2.0),
            z: rng.gen_range(8.0..11.0),
            status: rng.gen_range(0..=1),
            utc: Utc::now().timestamp_millis(),
        }
    }
}
