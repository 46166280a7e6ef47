//! Bulk reassignment of installations to a new location.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::edit::validate_location_id;
use crate::domain::models::{Actor, InstallationPatch};
use crate::domain::ports::{BatchPatch, InstallationFilters, InstallationRepository, MAX_BATCH_OPS};
use crate::infrastructure::logging::audit::{self, AuditEventType};
use crate::services::authorize;

/// Moves every installation matching a filter to a new location id.
///
/// The first reassignment of a record copies its location into
/// `originalLocationId`; later ones leave that untouched. Each record's two
/// writes travel in one batch operation, so a chunk boundary never splits them.
pub struct LocationReassigner {
    installations: Arc<dyn InstallationRepository>,
    chunk_size: usize,
}

impl LocationReassigner {
    pub fn new(installations: Arc<dyn InstallationRepository>) -> Self {
        Self {
            installations,
            chunk_size: MAX_BATCH_OPS,
        }
    }

    /// Use smaller chunks than the store limit.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_BATCH_OPS);
        self
    }

    /// Returns the number of installations updated.
    ///
    /// Chunks commit independently: if a later chunk fails, earlier chunks
    /// stay applied and the error is returned.
    #[instrument(skip(self, filters, actor), fields(actor = %actor.id), err)]
    pub async fn reassign_location(
        &self,
        filters: InstallationFilters,
        new_location_id: &str,
        actor: &Actor,
    ) -> DomainResult<usize> {
        authorize(actor, actor.role.can_administer(), "reassign locations")?;
        validate_location_id(new_location_id)?;

        let matches = self.installations.list(filters).await?;
        let ops: Vec<BatchPatch> = matches
            .iter()
            .map(|installation| BatchPatch {
                id: installation.id,
                patch: InstallationPatch {
                    preserve_original_location: true,
                    location_id: Some(new_location_id.to_string()),
                    ..Default::default()
                },
            })
            .collect();

        let mut updated = 0;
        for (index, chunk) in ops.chunks(self.chunk_size).enumerate() {
            let applied = self.installations.apply_batch(chunk).await?;
            debug!(chunk = index, applied, "reassignment chunk committed");
            updated += applied;
        }

        audit::record(
            AuditEventType::LocationReassigned,
            &actor.id,
            new_location_id,
            &format!("{updated} installations"),
        );
        info!(updated, new_location_id, "locations reassigned");
        Ok(updated)
    }
}
