//! Reconciliation of installer readings against device telemetry.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::classification::{auto_reject_reason, classify};
use crate::domain::models::{
    Actor, Classification, DeviceStatus, Installation, InstallationPatch, InstallationStatus,
    SYSTEM_AUTO_REJECT_ACTOR,
};
use crate::domain::ports::{DeviceRepository, InstallationRepository, TelemetryClient};
use crate::infrastructure::logging::audit::{self, AuditEventType};
use crate::services::authorize;

/// What a reconciliation attempt did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The device has not reported; only `serverRefreshedAt` advanced
    NoData,
    /// Readings were compared and persisted
    Classified { classification: Classification },
    /// Telemetry failed transiently; nothing was written
    Deferred { reason: String },
    /// A human already approved the installation; nothing was written
    AlreadyVerified,
}

/// Result of one reconciliation attempt with the document as it now stands.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub installation: Installation,
    pub outcome: ReconcileOutcome,
}

/// Fetches the device reading for an installation, classifies the variance and
/// persists the result as a field-level patch.
///
/// Idempotent: running it twice against unchanged telemetry converges on the
/// same document apart from `serverRefreshedAt`.
pub struct ReconciliationEngine {
    installations: Arc<dyn InstallationRepository>,
    devices: Arc<dyn DeviceRepository>,
    telemetry: Arc<dyn TelemetryClient>,
}

impl ReconciliationEngine {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        devices: Arc<dyn DeviceRepository>,
        telemetry: Arc<dyn TelemetryClient>,
    ) -> Self {
        Self {
            installations,
            devices,
            telemetry,
        }
    }

    /// Reconcile at a caller's request. Only reviewers may force a refresh;
    /// the scheduler calls [`Self::reconcile`] directly.
    pub async fn reconcile_as(&self, id: Uuid, actor: &Actor) -> DomainResult<ReconcileReport> {
        authorize(actor, actor.role.can_verify(), "trigger reconciliation")?;
        self.reconcile(id).await
    }

    #[instrument(skip(self), err)]
    pub async fn reconcile(&self, id: Uuid) -> DomainResult<ReconcileReport> {
        let installation = self
            .installations
            .get(id)
            .await?
            .ok_or(DomainError::InstallationNotFound(id))?;

        if installation.status.is_terminal() {
            debug!("installation already verified; skipping");
            return Ok(ReconcileReport {
                installation,
                outcome: ReconcileOutcome::AlreadyVerified,
            });
        }

        let reading = match self.telemetry.fetch_latest(&installation.device_id).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(device_id = %installation.device_id, error = %e, "telemetry unavailable; deferring");
                return Ok(ReconcileReport {
                    installation,
                    outcome: ReconcileOutcome::Deferred {
                        reason: e.to_string(),
                    },
                });
            }
        };

        let now = Utc::now();
        // A non-positive distance is a sensor placeholder, not a measurement.
        let Some(reading) = reading.filter(|r| r.dis_cm > 0.0) else {
            let patch = InstallationPatch {
                server_refreshed_at: Some(Some(now)),
                ..Default::default()
            };
            let installation = self.installations.patch(id, &patch).await?;
            return Ok(ReconcileReport {
                installation,
                outcome: ReconcileOutcome::NoData,
            });
        };

        let classification = classify(installation.sensor_reading, Some(reading.dis_cm));
        let mut patch = InstallationPatch {
            latest_dis_cm: Some(Some(reading.dis_cm)),
            latest_dis_timestamp: Some(Some(reading.timestamp.clone())),
            server_refreshed_at: Some(Some(now)),
            ..Default::default()
        };

        // A flagged installation keeps its reviewer's verdict; only readings move.
        let auto_rejected = matches!(classification, Classification::AutoReject { .. })
            && installation.status == InstallationStatus::Pending;

        match classification {
            Classification::AutoReject { .. } if !auto_rejected => {
                patch.system_pre_verified = Some(false);
                patch.system_pre_verified_at = Some(None);
            }
            Classification::AutoReject { variance } => {
                patch.status = Some(InstallationStatus::Flagged);
                patch.flagged_reason = Some(Some(auto_reject_reason(variance)));
                patch.verified_by = Some(Some(SYSTEM_AUTO_REJECT_ACTOR.to_string()));
                patch.verified_at = Some(Some(now));
                patch.system_pre_verified = Some(false);
                patch.system_pre_verified_at = Some(None);
            }
            Classification::PreVerified { .. } => {
                // Pre-verification only ever applies to pending installations.
                if installation.status == InstallationStatus::Pending {
                    patch.system_pre_verified = Some(true);
                    patch.system_pre_verified_at = Some(Some(now));
                }
            }
            Classification::NeedsManualReview { .. } | Classification::NoData => {
                patch.system_pre_verified = Some(false);
                patch.system_pre_verified_at = Some(None);
            }
        }

        let updated = self.installations.patch(id, &patch).await?;

        if let (true, Classification::AutoReject { variance }) = (auto_rejected, classification) {
            if self
                .devices
                .update_status(&updated.device_id, DeviceStatus::Flagged)
                .await?
                .is_none()
            {
                warn!(device_id = %updated.device_id, "device not in registry; status not propagated");
            }
            audit::record(
                AuditEventType::InstallationAutoRejected,
                SYSTEM_AUTO_REJECT_ACTOR,
                &id.to_string(),
                &format!("variance {variance:.2}%"),
            );
        }

        info!(
            classification = classification.as_str(),
            variance = classification.variance(),
            "installation reconciled"
        );
        Ok(ReconcileReport {
            installation: updated,
            outcome: ReconcileOutcome::Classified { classification },
        })
    }
}
