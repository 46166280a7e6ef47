//! Audit trail for verifier and administrator actions.
//!
//! Audit records are ordinary tracing events on the `audit` target, so they
//! follow the configured outputs and can be split out with an `EnvFilter`
//! directive such as `audit=info`.

use serde::Serialize;

/// Tracing target carrying audit records.
pub const AUDIT_TARGET: &str = "audit";

/// Audited operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    InstallationSubmitted,
    InstallationApproved,
    InstallationRejected,
    InstallationAutoRejected,
    InstallationEdited,
    InstallationDeleted,
    LocationReassigned,
    DeviceImported,
    BoxOpened,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstallationSubmitted => "installation_submitted",
            Self::InstallationApproved => "installation_approved",
            Self::InstallationRejected => "installation_rejected",
            Self::InstallationAutoRejected => "installation_auto_rejected",
            Self::InstallationEdited => "installation_edited",
            Self::InstallationDeleted => "installation_deleted",
            Self::LocationReassigned => "location_reassigned",
            Self::DeviceImported => "device_imported",
            Self::BoxOpened => "box_opened",
        }
    }
}

/// Emit one audit record.
pub fn record(event: AuditEventType, actor: &str, resource_id: &str, detail: &str) {
    tracing::info!(
        target: AUDIT_TARGET,
        event = event.as_str(),
        actor,
        resource_id,
        detail,
        "audit"
    );
}
