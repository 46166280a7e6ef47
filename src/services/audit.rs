//! Versioned verifier edits.
//!
//! Every overwritten value is kept in the field's history; nothing a verifier
//! changes is ever lost.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::edit::{changes_to_patch, diff};
use crate::domain::models::{
    Actor, EditableField, EligibilityError, FieldChange, FieldValue, Installation, NewImage,
    ProposedEdit,
};
use crate::domain::ports::{DatabaseError, DeviceRepository, InstallationRepository, ObjectStore};
use crate::infrastructure::logging::audit::{self, AuditEventType};
use crate::services::authorize;

/// Result of applying a proposed edit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EditOutcome {
    /// Nothing differed and no image was attached; nothing was written
    NoChanges { installation: Installation },
    Applied {
        changes: Vec<FieldChange>,
        installation: Installation,
    },
}

impl EditOutcome {
    pub fn installation(&self) -> &Installation {
        match self {
            Self::NoChanges { installation } | Self::Applied { installation, .. } => installation,
        }
    }
}

pub struct AuditService {
    installations: Arc<dyn InstallationRepository>,
    devices: Arc<dyn DeviceRepository>,
    objects: Arc<dyn ObjectStore>,
}

impl AuditService {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        devices: Arc<dyn DeviceRepository>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            installations,
            devices,
            objects,
        }
    }

    /// Apply a verifier's proposed edit.
    ///
    /// Differing fields have their current value appended to that field's
    /// history before being overwritten, and the installation is tagged as
    /// edited. The write is a single field-level patch, so concurrent
    /// reconciliation of the readings is not lost.
    #[instrument(skip(self, proposal, actor), fields(actor = %actor.id), err)]
    pub async fn apply_edit(
        &self,
        id: Uuid,
        proposal: ProposedEdit,
        actor: &Actor,
    ) -> DomainResult<EditOutcome> {
        authorize(actor, actor.role.can_verify(), "edit installations")?;
        proposal.validate()?;

        let current = self
            .installations
            .get(id)
            .await?
            .ok_or(DomainError::InstallationNotFound(id))?;

        let changes = diff(&current, &proposal);
        if changes.is_empty() && proposal.image.is_none() {
            return Ok(EditOutcome::NoChanges {
                installation: current,
            });
        }

        if let Some(new_device_id) = changes.iter().find_map(device_id_change) {
            self.check_device_target(id, &new_device_id).await?;
        }

        let image_url = match proposal.image {
            Some(image) => Some(self.upload(id, image).await?),
            None => None,
        };

        let patch = changes_to_patch(&changes, image_url);
        let installation = match self.installations.patch(id, &patch).await {
            Ok(installation) => installation,
            Err(DatabaseError::UniqueViolation(_)) => {
                let device_id = patch.device_id.unwrap_or_default();
                return Err(EligibilityError::AlreadyInstalled(device_id).into());
            }
            Err(e) => return Err(e.into()),
        };

        let summary = changes
            .iter()
            .map(|c| format!("{}: {} -> {}", c.field, c.previous, c.proposed))
            .collect::<Vec<_>>()
            .join("; ");
        audit::record(
            AuditEventType::InstallationEdited,
            &actor.id,
            &id.to_string(),
            &summary,
        );
        info!(changed = changes.len(), "installation edited");

        Ok(EditOutcome::Applied {
            changes,
            installation,
        })
    }

    async fn check_device_target(&self, id: Uuid, device_id: &str) -> DomainResult<()> {
        if self.devices.get(device_id).await?.is_none() {
            return Err(DomainError::DeviceNotFound(device_id.to_string()));
        }
        if let Some(other) = self.installations.find_by_device(device_id).await? {
            if other.id != id {
                return Err(EligibilityError::AlreadyInstalled(device_id.to_string()).into());
            }
        }
        Ok(())
    }

    async fn upload(&self, id: Uuid, image: NewImage) -> DomainResult<String> {
        let path = format!(
            "installations/{id}/{}-{}",
            Uuid::new_v4(),
            sanitize_file_name(&image.file_name)
        );
        Ok(self
            .objects
            .put(&path, image.bytes, &image.content_type)
            .await?)
    }
}

fn device_id_change(change: &FieldChange) -> Option<String> {
    match (&change.field, &change.proposed) {
        (EditableField::DeviceId, FieldValue::Text(v)) => Some(v.clone()),
        _ => None,
    }
}

/// Keep only the final path segment of an uploaded file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "image".to_string()
    } else {
        base.to_string()
    }
}
