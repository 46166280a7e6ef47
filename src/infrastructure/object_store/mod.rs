//! Image storage adapters.

pub mod local;

pub use local::LocalObjectStore;
