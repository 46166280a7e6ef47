//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Document store implementations (SQLite with sqlx, in-memory)
//! - Telemetry service client
//! - Object storage for installation images
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod database;
pub mod logging;
pub mod object_store;
pub mod telemetry;
