use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Batch of {0} operations exceeds the store limit")]
    BatchTooLarge(usize),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Telemetry fetch failures. All of them are transient: the caller leaves
/// state unchanged and retries on a later tick.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry service returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed telemetry response: {0}")]
    Malformed(String),
}

/// Object storage failures
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}
