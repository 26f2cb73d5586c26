use crate::errors::Result;
use crate::model::{
    AccelerationSensor, Device, DeviceStatus, NewAccelerationSample, NewDevice, NewPosition,
    Position,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Fails with `Error::DuplicateImei` if the IMEI is taken
    async fn create_device(&self, device: NewDevice) -> Result<Device>;

    async fn find_by_imei(&self, imei: &str) -> Result<Option<Device>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Device>>;

    async fn find_by_owner(&self, owner: Uuid) -> Result<Vec<Device>>;

    /// Replaces the status fields and refreshes `last_contact`. Owner and
    /// reference lists are left alone. `None` if no device has this IMEI.
    async fn update_status_by_imei(
        &self,
        imei: &str,
        status: &DeviceStatus,
        last_contact: &str,
    ) -> Result<Option<Device>>;

    async fn append_position(&self, device_id: Uuid, position_id: Uuid) -> Result<()>;

    async fn append_acceleration(&self, device_id: Uuid, sample_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn insert_position(&self, position: NewPosition) -> Result<Position>;

    /// Newest first by `utc`
    async fn positions_for_device(
        &self,
        device_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Position>>;

    async fn count_positions(&self, device_id: Uuid) -> Result<usize>;

    /// The position with the largest `utc`
    async fn latest_position(&self, device_id: Uuid) -> Result<Option<Position>>;

    async fn insert_acceleration(&self, sample: NewAccelerationSample)
        -> Result<AccelerationSensor>;

    async fn acceleration_for_device(
        &self,
        device_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AccelerationSensor>>;

    async fn count_acceleration(&self, device_id: Uuid) -> Result<usize>;
}
