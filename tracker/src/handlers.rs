use crate::errors::{Error, Result};
use crate::metrics::EVENTS_DROPPED_TOTAL;
use crate::model::{AccelerationSensor, Device, Position, TelemetryEvent};
use crate::payload::{decode, AccelerationReport, CoordinatesReport, StatusReport, TopicKind};
use crate::store::{DeviceRepository, TelemetryRepository};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Persists device reports, one method per topic family
#[derive(Clone)]
pub struct Ingestor {
    devices: Arc<dyn DeviceRepository>,
    telemetry: Arc<dyn TelemetryRepository>,
    events: mpsc::Sender<TelemetryEvent>,
}

impl Ingestor {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        telemetry: Arc<dyn TelemetryRepository>,
        events: mpsc::Sender<TelemetryEvent>,
    ) -> Self {
        Self {
            devices,
            telemetry,
            events,
        }
    }

    pub async fn handle(
        &self,
        kind: TopicKind,
        fields: Map<String, Value>,
        topic: &str,
    ) -> Result<()> {
        debug!("Handling {:?} report from {}", kind, topic);

        match kind {
            TopicKind::DeviceStatus => self.update_status(fields).await.map(|_| ()),
            TopicKind::Coordinates => self.add_position(fields).await.map(|_| ()),
            TopicKind::Acceleration => self.add_acceleration(fields).await.map(|_| ()),
        }
    }

    /// Replaces the device's status fields and stamps `last_contact`
    pub async fn update_status(&self, fields: Map<String, Value>) -> Result<Device> {
        let report: StatusReport = decode(fields)?;
        let last_contact = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let updated = self
            .devices
            .update_status_by_imei(&report.imei, &report.status(), &last_contact)
            .await?;

        updated.ok_or(Error::DeviceNotFound(report.imei))
    }

    /// Stores a GPS fix, links it to the device and hands it to the fan-out
    pub async fn add_position(&self, fields: Map<String, Value>) -> Result<Position> {
        let report: CoordinatesReport = decode(fields)?;
        let device = self.find_device(&report.imei).await?;

        let position = self
            .telemetry
            .insert_position(report.into_position(device.id))
            .await?;
        self.devices.append_position(device.id, position.id).await?;

        self.publish_event(TelemetryEvent {
            owner_id: device.owner.to_string(),
            record: position.clone(),
        });

        Ok(position)
    }

    /// Stores an accelerometer sample and links it to the device
    pub async fn add_acceleration(&self, fields: Map<String, Value>) -> Result<AccelerationSensor> {
        let report: AccelerationReport = decode(fields)?;
        let device = self.find_device(&report.imei).await?;

        let sample = self
            .telemetry
            .insert_acceleration(report.into_sample(device.id))
            .await?;
        self.devices.append_acceleration(device.id, sample.id).await?;

        Ok(sample)
    }

    async fn find_device(&self, imei: &str) -> Result<Device> {
        self.devices
            .find_by_imei(imei)
            .await?
            .ok_or_else(|| Error::DeviceNotFound(imei.to_string()))
    }

    /// Best effort: a full or closed queue costs the live view one position
    fn publish_event(&self, event: TelemetryEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                EVENTS_DROPPED_TOTAL.inc();
                warn!(
                    "Fan-out queue full, position {} not pushed live",
                    event.record.id
                );
            }
            Err(TrySendError::Closed(event)) => {
                EVENTS_DROPPED_TOTAL.inc();
                warn!(
                    "Fan-out queue closed, position {} not pushed live",
                    event.record.id
                );
            }
        }
    }
}
