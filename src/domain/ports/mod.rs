//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that infrastructure adapters must implement:
//! - InstallationRepository / DeviceRepository: the document store
//! - ChangeFeed: real-time change notifications from the store
//! - TelemetryClient: the external device telemetry API
//! - ObjectStore: image uploads
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod change_feed;
pub mod device_repository;
pub mod errors;
pub mod installation_repository;
pub mod object_store;
pub mod telemetry_client;

pub use change_feed::ChangeFeed;
pub use device_repository::{DeviceFilters, DeviceRepository};
pub use errors::{DatabaseError, ObjectStoreError, TelemetryError};
pub use installation_repository::{
    BatchPatch, InstallationFilters, InstallationRepository, MAX_BATCH_OPS,
};
pub use object_store::ObjectStore;
pub use telemetry_client::TelemetryClient;
