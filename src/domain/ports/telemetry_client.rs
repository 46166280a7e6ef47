use async_trait::async_trait;

use crate::domain::models::TelemetryReading;
use crate::domain::ports::errors::TelemetryError;

/// Client for the external telemetry service.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Fetch the device's most recent reading.
    ///
    /// # Returns
    /// * `Ok(Some(reading))` - the device has reported
    /// * `Ok(None)` - no data yet (HTTP 404 or no records); not an error
    /// * `Err(TelemetryError)` - transient failure, retry later
    async fn fetch_latest(&self, device_id: &str) -> Result<Option<TelemetryReading>, TelemetryError>;
}
