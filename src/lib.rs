//! installtrack - sensor installation tracking
//!
//! Installers record which device they mounted where and the distance reading
//! they measured. The device's own telemetry is fetched in the background and
//! compared with that reading: close matches are pre-verified, large variances
//! are rejected automatically, everything else waits for a human verifier.
//! Verifier edits keep every replaced value in a per-field history.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business rules, models and port traits
//! - **Service Layer** (`services`): Orchestration over the ports
//! - **Infrastructure Layer** (`infrastructure`): SQLite store, telemetry client,
//!   object store, configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use installtrack::infrastructure::database::InMemoryStore;
//! use installtrack::services::InstallationService;
//!
//! let store = InMemoryStore::new();
//! let service = InstallationService::new(Arc::new(store.clone()), Arc::new(store));
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    classify, Actor, Classification, Config, Device, DeviceStatus, Installation,
    InstallationStatus, Role, StalenessProfile,
};
pub use domain::ports::{
    ChangeFeed, DeviceRepository, InstallationFilters, InstallationRepository, ObjectStore,
    TelemetryClient,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::database::{DatabaseConnection, InMemoryStore};
pub use services::{
    AuditService, DeviceRegistry, InstallationService, LocationReassigner, ReconciliationEngine,
    ReconciliationScheduler,
};
