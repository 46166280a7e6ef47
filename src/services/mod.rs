//! Service layer: orchestration over the domain ports.
//!
//! - `InstallationService`: submit, approve, reject, delete
//! - `DeviceRegistry`: bulk import and box opening
//! - `ReconciliationEngine`: compare installer and device readings
//! - `AuditService`: versioned verifier edits
//! - `LocationReassigner`: chunked bulk location moves
//! - `SingleFlight` and `ReconciliationScheduler`: background polling

pub mod audit;
pub mod device_registry;
pub mod installation_service;
pub mod location_reassignment;
pub mod reconciliation;
pub mod scheduler;
pub mod single_flight;

pub use audit::{AuditService, EditOutcome};
pub use device_registry::DeviceRegistry;
pub use installation_service::{InstallationService, SubmitInstallation};
pub use location_reassignment::LocationReassigner;
pub use reconciliation::{ReconcileOutcome, ReconcileReport, ReconciliationEngine};
pub use scheduler::{Attempt, ReconciliationScheduler, SchedulerHandle, SweepSummary};
pub use single_flight::{InFlightGuard, SingleFlight};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Actor;

/// Fail with `Forbidden` unless the actor's role permits `action`.
pub(crate) fn authorize(actor: &Actor, permitted: bool, action: &'static str) -> DomainResult<()> {
    if permitted {
        Ok(())
    } else {
        Err(DomainError::Forbidden {
            actor: actor.id.clone(),
            role: actor.role.to_string(),
            action,
        })
    }
}
