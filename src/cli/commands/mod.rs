//! Subcommand implementations.
//!
//! Each module exposes a clap `Args` struct and an `execute` function that
//! builds its services from an [`AppContext`](crate::cli::AppContext).

pub mod device;
pub mod installation;
pub mod scheduler;
