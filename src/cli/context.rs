//! Wiring of configuration, logging, storage and services for one CLI run.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::models::Config;
use crate::domain::ports::{DeviceRepository, InstallationRepository, TelemetryClient};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{
    BroadcastChangeFeed, DatabaseConnection, SqliteDeviceRepository,
    SqliteInstallationRepository, DEFAULT_FEED_CAPACITY,
};
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::object_store::LocalObjectStore;
use crate::infrastructure::telemetry::HttpTelemetryClient;
use crate::services::{
    AuditService, DeviceRegistry, InstallationService, LocationReassigner, ReconciliationEngine,
};

pub struct AppContext {
    pub config: Config,
    pub connection: DatabaseConnection,
    pub feed: BroadcastChangeFeed,
    pub installations: Arc<dyn InstallationRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    _logger: LoggerImpl,
}

impl AppContext {
    /// Load configuration from `config_dir`, start logging and open the
    /// migrated database.
    pub async fn open(config_dir: &Path) -> Result<Self> {
        let config = ConfigLoader::load_from_dir(config_dir)?;
        let logger = LoggerImpl::init(&LogConfig::from(&config.logging))
            .context("Failed to initialize logging")?;

        let connection =
            DatabaseConnection::open_path(&config.database.path, config.database.max_connections)
                .await
                .with_context(|| format!("Failed to open database {}", config.database.path))?;
        connection
            .migrate()
            .await
            .context("Failed to run database migrations")?;

        let feed = BroadcastChangeFeed::new(DEFAULT_FEED_CAPACITY);
        let installations = Arc::new(SqliteInstallationRepository::new(
            connection.pool().clone(),
            feed.clone(),
        ));
        let devices = Arc::new(SqliteDeviceRepository::new(
            connection.pool().clone(),
            feed.clone(),
        ));

        Ok(Self {
            config,
            connection,
            feed,
            installations,
            devices,
            _logger: logger,
        })
    }

    pub fn installation_service(&self) -> InstallationService {
        InstallationService::new(self.installations.clone(), self.devices.clone())
    }

    pub fn device_registry(&self) -> DeviceRegistry {
        DeviceRegistry::new(self.devices.clone())
    }

    pub fn audit_service(&self) -> AuditService {
        let objects = Arc::new(LocalObjectStore::new(&self.config.object_store));
        AuditService::new(self.installations.clone(), self.devices.clone(), objects)
    }

    pub fn reassigner(&self) -> LocationReassigner {
        LocationReassigner::new(self.installations.clone())
    }

    pub fn reconciliation_engine(&self) -> Result<ReconciliationEngine> {
        let telemetry: Arc<dyn TelemetryClient> =
            Arc::new(HttpTelemetryClient::new(&self.config.telemetry)?);
        Ok(ReconciliationEngine::new(
            self.installations.clone(),
            self.devices.clone(),
            telemetry,
        ))
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }
}
