//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across multiple integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use installtrack::domain::models::{Actor, Device, Role};
use installtrack::infrastructure::database::{
    BroadcastChangeFeed, DatabaseConnection, SqliteDeviceRepository,
    SqliteInstallationRepository, DEFAULT_FEED_CAPACITY,
};
use installtrack::DeviceRepository;

/// A migrated in-memory SQLite store with both repositories sharing one feed.
pub struct TestStore {
    pub connection: DatabaseConnection,
    pub feed: BroadcastChangeFeed,
    pub installations: Arc<SqliteInstallationRepository>,
    pub devices: Arc<SqliteDeviceRepository>,
}

pub async fn sqlite_store() -> TestStore {
    let connection = DatabaseConnection::new("sqlite::memory:", 1)
        .await
        .expect("failed to create connection");
    connection.migrate().await.expect("failed to run migrations");

    let feed = BroadcastChangeFeed::new(DEFAULT_FEED_CAPACITY);
    let installations = Arc::new(SqliteInstallationRepository::new(
        connection.pool().clone(),
        feed.clone(),
    ));
    let devices = Arc::new(SqliteDeviceRepository::new(
        connection.pool().clone(),
        feed.clone(),
    ));
    TestStore {
        connection,
        feed,
        installations,
        devices,
    }
}

pub async fn seed_devices(devices: &dyn DeviceRepository, list: &[Device]) {
    for device in list {
        devices.upsert(device).await.expect("failed to seed device");
    }
}

pub fn installer(team: &str) -> Actor {
    Actor::new("inst-1", "Ada Installer", Role::Installer).in_team(team)
}

pub fn verifier() -> Actor {
    Actor::new("ver-1", "Vic Verifier", Role::Verifier)
}

pub fn admin() -> Actor {
    Actor::new("adm-1", "Ana Admin", Role::Admin)
}

/// Body of a telemetry response carrying one reading.
pub fn telemetry_body(dis_cm: f64) -> String {
    serde_json::json!({
        "records": [
            { "dis_cm": dis_cm, "timestamp": "2024-06-01T08:00:00Z" }
        ]
    })
    .to_string()
}

/// Setup test logging
///
/// Initializes a tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
