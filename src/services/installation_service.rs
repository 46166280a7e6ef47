//! Installation lifecycle: submission and human verification.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::edit::{
    validate_coordinates, validate_location_id, validate_sensor_reading,
};
use crate::domain::models::eligibility::validate;
use crate::domain::models::{
    Actor, DeviceStatus, EditValidationError, EligibilityCheck, EligibilityError, Installation,
    InstallationPatch, InstallationStatus, ReadingUnit,
};
use crate::domain::ports::{
    DatabaseError, DeviceRepository, InstallationFilters, InstallationRepository,
};
use crate::infrastructure::logging::audit::{self, AuditEventType};
use crate::services::authorize;

/// An installer's submission, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInstallation {
    pub device_id: String,
    pub location_id: String,
    pub sensor_reading: f64,
    #[serde(default)]
    pub unit: ReadingUnit,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Creates installations and applies human approve/reject/delete decisions,
/// keeping the device status in step.
pub struct InstallationService {
    installations: Arc<dyn InstallationRepository>,
    devices: Arc<dyn DeviceRepository>,
}

impl InstallationService {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        devices: Arc<dyn DeviceRepository>,
    ) -> Self {
        Self {
            installations,
            devices,
        }
    }

    /// Submit a new installation.
    ///
    /// Eligibility is evaluated against a fresh read of the device and any
    /// existing installation. A concurrent submission that wins the race is
    /// caught by the store's uniqueness rule and reported as `AlreadyInstalled`.
    #[instrument(skip(self, request, actor), fields(device_id = %request.device_id, actor = %actor.id), err)]
    pub async fn submit(
        &self,
        request: SubmitInstallation,
        actor: &Actor,
    ) -> DomainResult<Installation> {
        authorize(actor, actor.role.can_submit(), "submit installations")?;

        let device_id = request.device_id.trim();
        if device_id.is_empty() {
            return Err(EditValidationError::EmptyDeviceId.into());
        }
        let reading_cm = request.unit.to_centimeters(request.sensor_reading);
        validate_sensor_reading(reading_cm)?;
        validate_location_id(&request.location_id)?;
        validate_coordinates(request.latitude, request.longitude)?;

        let device = self.devices.get(device_id).await?;
        let existing = self.installations.find_by_device(device_id).await?;
        validate(&EligibilityCheck {
            device: device.as_ref(),
            device_id,
            installer_id: &actor.id,
            installer_team_id: actor.team_id.as_deref(),
            requires_assignment: actor.role.requires_device_assignment(),
            existing: existing.as_ref(),
        })?;

        let mut installation =
            Installation::new(device_id, &actor.id, &request.location_id, reading_cm);
        installation.team_id = device
            .as_ref()
            .and_then(|d| d.team_id.clone())
            .or_else(|| actor.team_id.clone());
        installation.installed_by_name.clone_from(&actor.name);
        installation.latitude = request.latitude;
        installation.longitude = request.longitude;

        match self.installations.insert(&installation).await {
            Ok(()) => {}
            Err(DatabaseError::UniqueViolation(_)) => {
                return Err(EligibilityError::AlreadyInstalled(device_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        }

        self.set_device_status(device_id, DeviceStatus::Installed)
            .await?;
        audit::record(
            AuditEventType::InstallationSubmitted,
            &actor.id,
            &installation.id.to_string(),
            &format!("device {device_id}, {reading_cm} cm"),
        );
        info!(installation_id = %installation.id, "installation submitted");
        Ok(installation)
    }

    /// Approve an installation. Overrides any system classification.
    #[instrument(skip(self, actor), fields(actor = %actor.id), err)]
    pub async fn approve(&self, id: Uuid, actor: &Actor) -> DomainResult<Installation> {
        authorize(actor, actor.role.can_verify(), "approve installations")?;
        self.require(id).await?;

        let now = Utc::now();
        let patch = InstallationPatch {
            status: Some(InstallationStatus::Verified),
            verified_by: Some(Some(actor.id.clone())),
            verified_at: Some(Some(now)),
            flagged_reason: Some(None),
            system_pre_verified: Some(false),
            system_pre_verified_at: Some(None),
            ..Default::default()
        };
        let updated = self.installations.patch(id, &patch).await?;
        self.set_device_status(&updated.device_id, DeviceStatus::Verified)
            .await?;

        audit::record(
            AuditEventType::InstallationApproved,
            &actor.id,
            &id.to_string(),
            &updated.device_id,
        );
        Ok(updated)
    }

    /// Reject (flag) an installation with a mandatory reason.
    #[instrument(skip(self, reason, actor), fields(actor = %actor.id), err)]
    pub async fn reject(&self, id: Uuid, reason: &str, actor: &Actor) -> DomainResult<Installation> {
        authorize(actor, actor.role.can_verify(), "reject installations")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::ReasonRequired);
        }
        self.require(id).await?;

        let now = Utc::now();
        let patch = InstallationPatch {
            status: Some(InstallationStatus::Flagged),
            flagged_reason: Some(Some(reason.to_string())),
            verified_by: Some(Some(actor.id.clone())),
            verified_at: Some(Some(now)),
            system_pre_verified: Some(false),
            system_pre_verified_at: Some(None),
            ..Default::default()
        };
        let updated = self.installations.patch(id, &patch).await?;
        self.set_device_status(&updated.device_id, DeviceStatus::Flagged)
            .await?;

        audit::record(
            AuditEventType::InstallationRejected,
            &actor.id,
            &id.to_string(),
            reason,
        );
        Ok(updated)
    }

    /// Delete an installation. Irreversible; the device becomes installable again.
    #[instrument(skip(self, actor), fields(actor = %actor.id), err)]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> DomainResult<Installation> {
        authorize(actor, actor.role.can_verify(), "delete installations")?;
        let removed = self
            .installations
            .delete(id)
            .await?
            .ok_or(DomainError::InstallationNotFound(id))?;
        self.set_device_status(&removed.device_id, DeviceStatus::Pending)
            .await?;

        audit::record(
            AuditEventType::InstallationDeleted,
            &actor.id,
            &id.to_string(),
            &removed.device_id,
        );
        Ok(removed)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Installation> {
        self.require(id).await
    }

    pub async fn list(&self, filters: InstallationFilters) -> DomainResult<Vec<Installation>> {
        Ok(self.installations.list(filters).await?)
    }

    async fn require(&self, id: Uuid) -> DomainResult<Installation> {
        self.installations
            .get(id)
            .await?
            .ok_or(DomainError::InstallationNotFound(id))
    }

    /// Devices missing from the registry are tolerated; installations may
    /// reference devices that were since removed from the import.
    async fn set_device_status(&self, device_id: &str, status: DeviceStatus) -> DomainResult<()> {
        if self.devices.update_status(device_id, status).await?.is_none() {
            warn!(device_id, status = %status, "device not in registry; status not propagated");
        }
        Ok(())
    }
}
