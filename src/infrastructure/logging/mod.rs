//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with optional
//! rolling JSON files and an `audit` target for verifier actions.

pub mod audit;
pub mod config;
pub mod logger;

pub use audit::{AuditEventType, AUDIT_TARGET};
pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
