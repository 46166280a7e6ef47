pub mod change;
pub mod classification;
pub mod config;
pub mod device;
pub mod edit;
pub mod eligibility;
pub mod installation;
pub mod staleness;
pub mod telemetry;

pub use change::{ChangeEvent, ChangeFilter, ChangeKind};
pub use classification::{auto_reject_reason, classify, variance, Classification};
pub use config::{
    Config, DatabaseConfig, LoggingConfig, ObjectStoreConfig, SchedulerConfig, TelemetryConfig,
};
pub use device::{Device, DeviceStatus};
pub use edit::{EditValidationError, FieldChange, NewImage, ProposedEdit, ReadingUnit};
pub use eligibility::{Actor, EligibilityCheck, EligibilityError, Role};
pub use installation::{
    EditHistory, EditableField, FieldValue, Installation, InstallationPatch, InstallationStatus,
    EDITED_BY_VERIFIER_TAG, SYSTEM_AUTO_REJECT_ACTOR,
};
pub use staleness::StalenessProfile;
pub use telemetry::{TelemetryReading, TelemetryResponse};
