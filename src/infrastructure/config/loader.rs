use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding configuration, the database and objects.
pub const PROJECT_DIR: &str = ".installtrack";

/// Prefix for environment overrides, e.g. `INSTALLTRACK_TELEMETRY__API_KEY`.
pub const ENV_PREFIX: &str = "INSTALLTRACK_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Telemetry base_url must be an http(s) URL, got: {0}")]
    InvalidTelemetryUrl(String),

    #[error("Invalid telemetry rate limit: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid staleness window for {0}: must be positive")]
    InvalidWindow(&'static str),

    #[error("Invalid scheduler max_concurrent: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .installtrack/config.yaml (project config)
    /// 3. .installtrack/local.yaml (local overrides, optional)
    /// 4. Environment variables (INSTALLTRACK_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(PROJECT_DIR)
    }

    /// Same layering as [`ConfigLoader::load`], rooted at `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let url = &config.telemetry.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidTelemetryUrl(url.clone()));
        }
        if config.telemetry.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.telemetry.requests_per_second,
            ));
        }

        if config.scheduler.installer_window_secs <= 0 {
            return Err(ConfigError::InvalidWindow("installer_window_secs"));
        }
        if config.scheduler.dashboard_window_secs <= 0 {
            return Err(ConfigError::InvalidWindow("dashboard_window_secs"));
        }
        if config.scheduler.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency(
                config.scheduler.max_concurrent,
            ));
        }
        if config.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "scheduler tick_interval_secs must be at least 1".to_string(),
            ));
        }

        if config.object_store.root.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "object_store root cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
