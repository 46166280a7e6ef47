//! Domain errors for the installation tracking system.

use thiserror::Error;
use uuid::Uuid;

use super::models::edit::EditValidationError;
use super::models::eligibility::EligibilityError;
use super::ports::errors::{DatabaseError, ObjectStoreError};

/// Domain-level errors surfaced to callers of the services.
///
/// Nothing here is fatal: every failure leaves stored state unchanged and is
/// reported to the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),

    #[error(transparent)]
    InvalidInput(#[from] EditValidationError),

    #[error("{actor} ({role}) may not {action}")]
    Forbidden {
        actor: String,
        role: String,
        action: &'static str,
    },

    #[error("Installation not found: {0}")]
    InstallationNotFound(Uuid),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("A rejection reason is required")]
    ReasonRequired,

    #[error("Storage error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Image upload failed: {0}")]
    ObjectStore(#[from] ObjectStoreError),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Short human-facing title; the `Display` output is the description.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Eligibility(e) => e.title(),
            Self::InvalidInput(_) => "Invalid input",
            Self::Forbidden { .. } => "Not allowed",
            Self::InstallationNotFound(_) => "Installation not found",
            Self::DeviceNotFound(_) => "Device not found",
            Self::ReasonRequired => "Reason required",
            Self::Store(_) => "Storage error",
            Self::ObjectStore(_) => "Upload failed",
        }
    }

    /// Conflicts are terminal for the attempt; the caller must not retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Eligibility(EligibilityError::AlreadyInstalled(_)))
    }

    /// Validation errors are the caller's fault and never retried automatically.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Eligibility(_)
                | Self::InvalidInput(_)
                | Self::Forbidden { .. }
                | Self::InstallationNotFound(_)
                | Self::DeviceNotFound(_)
                | Self::ReasonRequired
        )
    }
}
