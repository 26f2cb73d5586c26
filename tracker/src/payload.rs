//! Inbound topic and payload decoding.
//!
//! Every message first goes through [`classify`], which separates our own
//! acknowledgements and anonymous payloads from device reports. Reports are
//! then decoded into the typed struct of their topic family with [`decode`].

use crate::errors::Result;
use crate::model::{DeviceStatus, NewAccelerationSample, NewPosition};
use crate::validate::Validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const RESPONSE_TOPIC_PREFIX: &str = "receive/";

/// Topic families the router subscribes to. The last segment carries the IMEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    DeviceStatus,
    Coordinates,
    Acceleration,
}

impl TopicKind {
    pub const ALL: [TopicKind; 3] = [
        TopicKind::DeviceStatus,
        TopicKind::Coordinates,
        TopicKind::Acceleration,
    ];

    pub fn filter(self) -> &'static str {
        match self {
            TopicKind::DeviceStatus => "device/status/+",
            TopicKind::Coordinates => "gps/coordinates/+",
            TopicKind::Acceleration => "sensors/acceleration/+",
        }
    }

    /// Matches a concrete topic against the three `<a>/<b>/+` filters
    pub fn parse(topic: &str) -> Option<TopicKind> {
        let mut segments = topic.split('/');
        let (Some(first), Some(second), Some(_imei), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        match (first, second) {
            ("device", "status") => Some(TopicKind::DeviceStatus),
            ("gps", "coordinates") => Some(TopicKind::Coordinates),
            ("sensors", "acceleration") => Some(TopicKind::Acceleration),
            _ => None,
        }
    }
}

/// `receive/<last segment of topic>`
pub fn response_topic(topic: &str) -> String {
    let imei = topic.rsplit('/').next().unwrap_or(topic);
    format!("{RESPONSE_TOPIC_PREFIX}{imei}")
}

/// First-pass shape of an inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Carries a `response` key: one of our own acknowledgements
    SelfEcho,
    /// No `imei` key, or not a JSON object at all
    Anonymous,
    Report(Map<String, Value>),
}

pub fn classify(payload: &[u8]) -> Inbound {
    let Ok(fields) = serde_json::from_slice::<Map<String, Value>>(payload) else {
        return Inbound::Anonymous;
    };

    if fields.contains_key("response") {
        Inbound::SelfEcho
    } else if !fields.contains_key("imei") {
        Inbound::Anonymous
    } else {
        Inbound::Report(fields)
    }
}

/// Decodes a report into `T` and runs its validation rules
pub fn decode<T>(fields: Map<String, Value>) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let report: T = serde_json::from_value(Value::Object(fields))?;
    report.validate()?;
    Ok(report)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImei {
    Text(String),
    Number(u64),
}

/// Some firmware publishes the IMEI as a bare JSON number
fn imei<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawImei::deserialize(deserializer)? {
        RawImei::Text(imei) => imei,
        RawImei::Number(imei) => imei.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusReport {
    #[serde(deserialize_with = "imei")]
    pub imei: String,
    pub ip: String,
    pub inputs: i32,
    pub outputs: i32,
    pub led: i32,
    pub button: i32,
}

impl StatusReport {
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            ip: self.ip.clone(),
            inputs: self.inputs,
            outputs: self.outputs,
            led: self.led,
            button: self.button,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoordinatesReport {
    #[serde(deserialize_with = "imei")]
    pub imei: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    pub utc: i64,
}

impl CoordinatesReport {
    pub fn into_position(self, device: Uuid) -> NewPosition {
        NewPosition {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude.unwrap_or(0.0),
            utc: self.utc,
            device,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccelerationReport {
    #[serde(deserialize_with = "imei")]
    pub imei: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub status: i32,
    pub utc: i64,
}

impl AccelerationReport {
    pub fn into_sample(self, device: Uuid) -> NewAccelerationSample {
        NewAccelerationSample {
            x: self.x,
            y: self.y,
            z: self.z,
            status: self.status,
            utc: self.utc,
            device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_topic_kind_parse() {
        assert_eq!(
            TopicKind::parse("device/status/123"),
            Some(TopicKind::DeviceStatus)
        );
        assert_eq!(
            TopicKind::parse("gps/coordinates/123"),
            Some(TopicKind::Coordinates)
        );
        assert_eq!(
            TopicKind::parse("sensors/acceleration/123"),
            Some(TopicKind::Acceleration)
        );
        assert_eq!(TopicKind::parse("gps/coordinates"), None);
        assert_eq!(TopicKind::parse("gps/coordinates/123/extra"), None);
        assert_eq!(TopicKind::parse("receive/123"), None);
    }

    #[test]
    fn test_response_topic_uses_last_segment() {
        assert_eq!(response_topic("gps/coordinates/866349"), "receive/866349");
        assert_eq!(response_topic("device/status/abc"), "receive/abc");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(br#"{"topic":"gps/coordinates/1","response":"success"}"#),
            Inbound::SelfEcho
        );
        assert_eq!(classify(br#"{"response":null}"#), Inbound::SelfEcho);
        assert_eq!(classify(br#"{"latitude":1.0}"#), Inbound::Anonymous);
        assert_eq!(classify(b"not json"), Inbound::Anonymous);
        assert_eq!(classify(b"[1,2,3]"), Inbound::Anonymous);
        assert!(matches!(classify(br#"{"imei":"1"}"#), Inbound::Report(_)));
    }

    #[test]
    fn test_self_echo_wins_over_imei() {
        assert_eq!(
            classify(br#"{"imei":"1","response":"error"}"#),
            Inbound::SelfEcho
        );
    }

    #[test]
    fn test_decode_coordinates_defaults_altitude() {
        let report: CoordinatesReport = decode(fields(json!({
            "imei": "123",
            "latitude": 1.0,
            "longitude": 2.0,
            "utc": 1000
        })))
        .unwrap();

        let device = Uuid::new_v4();
        let position = report.into_position(device);
        assert_eq!(position.altitude, 0.0);
        assert_eq!(position.latitude, 1.0);
        assert_eq!(position.longitude, 2.0);
        assert_eq!(position.utc, 1000);
        assert_eq!(position.device, device);
    }

    #[test]
    fn test_decode_numeric_imei() {
        let report: CoordinatesReport = decode(fields(json!({
            "imei": 866349041737515_u64,
            "latitude": 0.0,
            "longitude": 0.0,
            "utc": 1_700_000_000_000_i64
        })))
        .unwrap();

        assert_eq!(report.imei, "866349041737515");
    }

    #[test]
    fn test_decode_missing_field_is_error() {
        let result: Result<StatusReport> = decode(fields(json!({
            "imei": "123",
            "ip": "10.0.0.1",
            "inputs": 1
        })));

        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_decode_acceleration() {
        let report: AccelerationReport = decode(fields(json!({
            "imei": "123",
            "x": 0.1,
            "y": -0.2,
            "z": 9.81,
            "status": 1,
            "utc": 5000
        })))
        .unwrap();

        let sample = report.into_sample(Uuid::nil());
        assert_eq!(sample.z, 9.81);
        assert_eq!(sample.status, 1);
    }
}
