//! Device readings reported through the external telemetry service.

use serde::{Deserialize, Serialize};

/// The most recent reading a device reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub dis_cm: f64,
    pub timestamp: String,
}

/// Response body of `GET /device/{id}`. Records are ordered newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryResponse {
    #[serde(default)]
    pub records: Option<Vec<TelemetryReading>>,
}

impl TelemetryResponse {
    /// The newest record, or `None` when the device has not reported yet.
    pub fn latest(self) -> Option<TelemetryReading> {
        self.records.unwrap_or_default().into_iter().next()
    }
}
