use serde::{Deserialize, Serialize};

/// Main configuration structure for installtrack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telemetry service configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Background reconciliation configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Image storage configuration
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".installtrack/installtrack.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Telemetry service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// Base URL of the telemetry API (without the `/device` path)
    #[serde(default = "default_telemetry_base_url")]
    pub base_url: String,

    /// Static API key sent as `X-API-KEY`
    /// (can also be set via `INSTALLTRACK_TELEMETRY__API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: u64,

    /// Requests per second allowed against the service
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for the rate limiter
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

fn default_telemetry_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_telemetry_timeout() -> u64 {
    15
}

const fn default_requests_per_second() -> u32 {
    5
}

const fn default_burst_size() -> u32 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: default_telemetry_base_url(),
            api_key: None,
            timeout_secs: default_telemetry_timeout(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Background reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Staleness window for an installer's own pending submissions
    #[serde(default = "default_installer_window")]
    pub installer_window_secs: i64,

    /// Staleness window for dashboard-driven reconciliation
    #[serde(default = "default_dashboard_window")]
    pub dashboard_window_secs: i64,

    /// Maximum reconciliations running at once within one tick
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

const fn default_tick_interval() -> u64 {
    60
}

const fn default_installer_window() -> i64 {
    120
}

const fn default_dashboard_window() -> i64 {
    24 * 60 * 60
}

const fn default_max_concurrent() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            installer_window_secs: default_installer_window(),
            dashboard_window_secs: default_dashboard_window(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Image storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectStoreConfig {
    /// Directory uploaded objects are written under
    #[serde(default = "default_object_root")]
    pub root: String,

    /// URL prefix under which `root` is served
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_object_root() -> String {
    ".installtrack/objects".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8081/objects".to_string()
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: default_object_root(),
            public_base_url: default_public_base_url(),
        }
    }
}
