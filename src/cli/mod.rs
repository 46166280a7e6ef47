//! Command-line surface over the services.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::errors::DomainError;
use crate::domain::models::{Actor, Role};
use crate::infrastructure::config::loader::PROJECT_DIR;

pub use commands::device::{DeviceArgs, DeviceCommands};
pub use commands::installation::{InstallationArgs, InstallationCommands};
pub use commands::scheduler::{SchedulerArgs, SchedulerCommands};
pub use context::AppContext;

#[derive(Parser, Debug)]
#[command(name = "installtrack", version, about = "Sensor installation tracking")]
pub struct Cli {
    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.yaml and local.yaml
    #[arg(long, global = true, default_value = PROJECT_DIR)]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Device registry: import, box opening, lookup
    Device(DeviceArgs),
    /// Installation lifecycle, verification and reconciliation
    Installation(InstallationArgs),
    /// Background reconciliation
    Scheduler(SchedulerArgs),
}

/// The caller, as asserted by the surrounding authentication layer.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    #[arg(long = "actor-id")]
    pub actor_id: String,

    #[arg(long = "actor-name", default_value = "")]
    pub actor_name: String,

    /// installer, scoped_installer, verifier or admin
    #[arg(long, default_value = "installer")]
    pub role: Role,

    #[arg(long = "actor-team")]
    pub actor_team: Option<String>,
}

impl ActorArgs {
    pub fn actor(&self) -> Actor {
        let name = if self.actor_name.is_empty() {
            self.actor_id.clone()
        } else {
            self.actor_name.clone()
        };
        let actor = Actor::new(self.actor_id.trim(), name, self.role);
        match &self.actor_team {
            Some(team) => actor.in_team(team.clone()),
            None => actor,
        }
    }
}

/// Print the error (as JSON when requested) and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let (title, message) = match err.downcast_ref::<DomainError>() {
        Some(domain) => (domain.title().to_string(), domain.to_string()),
        None => ("Error".to_string(), format!("{err:#}")),
    };

    if json_mode {
        let body = serde_json::json!({
            "error": { "title": title, "message": message }
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{title}: {message}");
    }
    std::process::exit(1)
}
