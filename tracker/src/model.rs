use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracker device. `imei` is the key devices use on the broker; `id` never
/// leaves the backend except through the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub imei: String,
    pub ip: String,
    pub inputs: i32,
    pub outputs: i32,
    pub led: i32,
    pub button: i32,
    pub last_contact: String,
    pub owner: Uuid,
    pub positions: Vec<Uuid>,
    pub acc_sensor_data: Vec<Uuid>,
}

/// Fields accepted when registering a device
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub imei: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub inputs: i32,
    #[serde(default)]
    pub outputs: i32,
    #[serde(default)]
    pub led: i32,
    #[serde(default)]
    pub button: i32,
    pub owner: Uuid,
}

/// Mutable status fields replaced by a `device/status` report
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub ip: String,
    pub inputs: i32,
    pub outputs: i32,
    pub led: i32,
    pub button: i32,
}

/// A GPS fix. `utc` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub utc: i64,
    pub device: Uuid,
}

/// Body of `POST /api/v1/positions`, also built from coordinates reports
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    pub utc: i64,
    pub device: Uuid,
}

/// One accelerometer sample. `utc` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccelerationSensor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub status: i32,
    pub utc: i64,
    pub device: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub status: i32,
    pub utc: i64,
    pub device: Uuid,
}

/// Handed from the coordinates handler to the fan-out task
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub owner_id: String,
    pub record: Position,
}

/// Outcome reported back to a device on `receive/<imei>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Success,
    Error,
    MissingImei,
}

impl AckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AckStatus::Success => "success",
            AckStatus::Error => "error",
            AckStatus::MissingImei => "missing_imei",
        }
    }
}

/// Acknowledgement envelope published by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub topic: String,
    pub response: AckStatus,
}

/// REST API response wrapper. `total` counts every matching record, not just
/// this page.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
