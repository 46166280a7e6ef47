use crate::domain::models::{Device, DeviceStatus};
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;

/// Filters for querying devices
#[derive(Default, Debug, Clone)]
pub struct DeviceFilters {
    pub team_id: Option<String>,
    pub box_number: Option<String>,
    pub status: Option<DeviceStatus>,
}

impl DeviceFilters {
    pub fn matches(&self, device: &Device) -> bool {
        self.team_id
            .as_deref()
            .is_none_or(|t| device.team_id.as_deref() == Some(t))
            && self
                .box_number
                .as_deref()
                .is_none_or(|b| device.box_number.as_deref() == Some(b))
            && self.status.is_none_or(|s| device.status == s)
    }
}

/// Repository port for the device registry
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a device, or refresh the registry fields (team, box, assignment)
    /// of an existing one. Status and box opening are left untouched.
    async fn upsert(&self, device: &Device) -> Result<(), DatabaseError>;

    /// Get a device by its hardware identifier
    async fn get(&self, id: &str) -> Result<Option<Device>, DatabaseError>;

    /// Set the device status, returning the updated device if it exists
    async fn update_status(&self, id: &str, status: DeviceStatus)
        -> Result<Option<Device>, DatabaseError>;

    /// Mark every device of `team_id` in `box_number` as opened
    async fn open_box(&self, team_id: &str, box_number: &str) -> Result<usize, DatabaseError>;

    /// List devices with optional filters
    async fn list(&self, filters: DeviceFilters) -> Result<Vec<Device>, DatabaseError>;
}
