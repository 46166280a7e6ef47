//! Background reconciliation CLI commands.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Subcommand, ValueEnum};
use tracing::info;

use crate::cli::output::{output, table, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::{SchedulerConfig, StalenessProfile};
use crate::services::{ReconciliationScheduler, SweepSummary};

#[derive(Args, Debug)]
pub struct SchedulerArgs {
    #[command(subcommand)]
    pub command: SchedulerCommands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileKind {
    /// One installer's pending submissions, short window
    Installer,
    /// Everything not yet verified, long window
    Dashboard,
}

/// Which population to watch.
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[arg(long, value_enum, default_value = "dashboard")]
    pub profile: ProfileKind,

    /// Installer whose submissions are watched (installer profile)
    #[arg(long)]
    pub installer: Option<String>,

    /// Restrict the dashboard profile to one team
    #[arg(long)]
    pub team: Option<String>,

    /// Override the configured staleness window
    #[arg(long)]
    pub window_secs: Option<i64>,
}

impl ProfileArgs {
    pub fn resolve(&self, config: &SchedulerConfig) -> Result<StalenessProfile> {
        match self.profile {
            ProfileKind::Installer => {
                let Some(installer_id) = self.installer.clone() else {
                    bail!("--installer is required for the installer profile");
                };
                Ok(StalenessProfile::InstallerSession {
                    installer_id,
                    window_secs: self.window_secs.unwrap_or(config.installer_window_secs),
                })
            }
            ProfileKind::Dashboard => Ok(StalenessProfile::Dashboard {
                team_id: self.team.clone(),
                window_secs: self.window_secs.unwrap_or(config.dashboard_window_secs),
            }),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SchedulerCommands {
    /// Reconcile continuously until interrupted with Ctrl-C
    Run {
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Run a single sweep and report what it did
    Sweep {
        #[command(flatten)]
        profile: ProfileArgs,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct SweepOutput {
    pub profile: StalenessProfile,
    pub summary: SweepSummary,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let rows = [
            ("Considered", s.considered),
            ("Due", s.due),
            ("Classified", s.classified),
            ("No data", s.no_data),
            ("Deferred", s.deferred),
            ("Skipped", s.skipped),
            ("Failed", s.failed),
        ]
        .into_iter()
        .map(|(label, count)| vec![label.to_string(), count.to_string()]);
        format!("Sweep ({})\n{}", self.profile.name(), table(&["", "Count"], rows))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// -- Execute --

pub async fn execute(args: SchedulerArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let build = |profile: &ProfileArgs| -> Result<ReconciliationScheduler> {
        let profile = profile.resolve(&ctx.config.scheduler)?;
        Ok(ReconciliationScheduler::new(
            Arc::new(ctx.reconciliation_engine()?),
            ctx.installations.clone(),
            Arc::new(ctx.feed.clone()),
            profile,
            &ctx.config.scheduler,
        ))
    };

    match args.command {
        SchedulerCommands::Run { profile } => {
            let scheduler = Arc::new(build(&profile)?);
            let (handle, join) = scheduler.spawn();

            tokio::signal::ctrl_c().await?;
            info!("interrupt received, stopping scheduler");
            handle.stop();
            join.await?;
        }

        SchedulerCommands::Sweep { profile } => {
            let scheduler = build(&profile)?;
            let summary = scheduler.sweep().await?;
            let out = SweepOutput {
                profile: scheduler.profile().clone(),
                summary,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
