//! Adapter for the external device telemetry service.

pub mod client;

pub use client::HttpTelemetryClient;
