use crate::domain::models::{Installation, InstallationPatch, InstallationStatus};
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;
use uuid::Uuid;

/// Largest number of operations a store commits in one atomic batch.
pub const MAX_BATCH_OPS: usize = 500;

/// Filters for querying installations
#[derive(Default, Debug, Clone)]
pub struct InstallationFilters {
    pub status: Option<InstallationStatus>,
    pub exclude_status: Option<InstallationStatus>,
    pub team_id: Option<String>,
    pub installed_by: Option<String>,
    pub location_id: Option<String>,
    pub limit: Option<i64>,
}

impl InstallationFilters {
    /// Installations reconciliation may still act on.
    pub fn non_terminal() -> Self {
        Self {
            exclude_status: Some(InstallationStatus::Verified),
            ..Default::default()
        }
    }

    pub fn matches(&self, installation: &Installation) -> bool {
        self.status.is_none_or(|s| installation.status == s)
            && self.exclude_status.is_none_or(|s| installation.status != s)
            && self
                .team_id
                .as_deref()
                .is_none_or(|t| installation.team_id.as_deref() == Some(t))
            && self
                .installed_by
                .as_deref()
                .is_none_or(|i| installation.installed_by == i)
            && self
                .location_id
                .as_deref()
                .is_none_or(|l| installation.location_id == l)
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub struct BatchPatch {
    pub id: Uuid,
    pub patch: InstallationPatch,
}

/// Repository port for installation documents
///
/// Patches are applied with read-modify-write inside the store's write scope,
/// so concurrent writers touching different fields do not lose each other's
/// updates. Writers touching the same field: last write wins.
#[async_trait]
pub trait InstallationRepository: Send + Sync {
    /// Insert a new installation. Fails with `UniqueViolation` if another
    /// installation already references the same device.
    async fn insert(&self, installation: &Installation) -> Result<(), DatabaseError>;

    /// Get an installation by ID
    async fn get(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError>;

    /// Get the installation referencing a device, if any
    async fn find_by_device(&self, device_id: &str) -> Result<Option<Installation>, DatabaseError>;

    /// Apply a field-level patch and return the updated document
    async fn patch(&self, id: Uuid, patch: &InstallationPatch)
        -> Result<Installation, DatabaseError>;

    /// Delete an installation, returning the removed document
    async fn delete(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError>;

    /// List installations with optional filters
    async fn list(&self, filters: InstallationFilters) -> Result<Vec<Installation>, DatabaseError>;

    /// Apply up to [`MAX_BATCH_OPS`] patches atomically. Returns the number applied.
    async fn apply_batch(&self, batch: &[BatchPatch]) -> Result<usize, DatabaseError>;
}
