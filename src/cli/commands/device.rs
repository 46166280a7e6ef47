//! Device registry CLI commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::output::{or_dash, output, table, CommandOutput};
use crate::cli::{ActorArgs, AppContext};
use crate::domain::models::{Device, DeviceStatus};
use crate::domain::ports::DeviceFilters;

#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommands,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Import devices from a JSON array, replacing existing records
    Import {
        /// Path to the JSON file
        file: PathBuf,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Mark a team's box as opened
    OpenBox {
        #[arg(long)]
        team: String,
        #[arg(long = "box")]
        box_number: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// List devices
    List {
        #[arg(long)]
        team: Option<String>,
        #[arg(long = "box")]
        box_number: Option<String>,
        /// pending, installed, verified or flagged
        #[arg(long)]
        status: Option<DeviceStatus>,
    },
    /// Show one device
    Show { id: String },
}

// -- Output types --

#[derive(Debug, serde::Serialize)]
pub struct DeviceOutput {
    pub id: String,
    pub team_id: Option<String>,
    pub box_number: Option<String>,
    pub box_opened: bool,
    pub assigned_installer_id: Option<String>,
    pub status: String,
}

impl From<&Device> for DeviceOutput {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            team_id: device.team_id.clone(),
            box_number: device.box_number.clone(),
            box_opened: device.box_opened,
            assigned_installer_id: device.assigned_installer_id.clone(),
            status: device.status.as_str().to_string(),
        }
    }
}

impl CommandOutput for DeviceOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Device: {}", self.id),
            format!("Status: {}", self.status),
            format!("Team: {}", or_dash(self.team_id.as_ref())),
        ];
        if let Some(ref box_number) = self.box_number {
            let state = if self.box_opened { "opened" } else { "sealed" };
            lines.push(format!("Box: {box_number} ({state})"));
        }
        if let Some(ref installer) = self.assigned_installer_id {
            lines.push(format!("Assigned to: {installer}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct DeviceListOutput {
    pub devices: Vec<DeviceOutput>,
    pub total: usize,
}

impl CommandOutput for DeviceListOutput {
    fn to_human(&self) -> String {
        if self.devices.is_empty() {
            return "No devices found.".to_string();
        }
        let rows = self.devices.iter().map(|d| {
            vec![
                d.id.clone(),
                d.status.clone(),
                or_dash(d.team_id.as_ref()),
                or_dash(d.box_number.as_ref()),
                if d.box_opened { "yes" } else { "no" }.to_string(),
                or_dash(d.assigned_installer_id.as_ref()),
            ]
        });
        format!(
            "{}\n{} device(s)",
            table(&["ID", "Status", "Team", "Box", "Opened", "Assigned"], rows),
            self.total
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct DeviceActionOutput {
    pub success: bool,
    pub count: usize,
    pub message: String,
}

impl CommandOutput for DeviceActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// -- Execute --

pub async fn execute(args: DeviceArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let registry = ctx.device_registry();

    match args.command {
        DeviceCommands::Import { file, actor } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let devices: Vec<Device> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of devices", file.display()))?;

            let count = registry.import(devices, &actor.actor()).await?;
            let out = DeviceActionOutput {
                success: true,
                count,
                message: format!("Imported {count} device(s) from {}", file.display()),
            };
            output(&out, json_mode);
        }

        DeviceCommands::OpenBox {
            team,
            box_number,
            actor,
        } => {
            let count = registry.open_box(&team, &box_number, &actor.actor()).await?;
            let out = DeviceActionOutput {
                success: true,
                count,
                message: format!("Opened box {box_number} for team {team}: {count} device(s)"),
            };
            output(&out, json_mode);
        }

        DeviceCommands::List {
            team,
            box_number,
            status,
        } => {
            let devices = registry
                .list(DeviceFilters {
                    team_id: team,
                    box_number,
                    status,
                })
                .await?;
            let out = DeviceListOutput {
                total: devices.len(),
                devices: devices.iter().map(DeviceOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        DeviceCommands::Show { id } => {
            let device = registry.get(id.trim()).await?;
            output(&DeviceOutput::from(&device), json_mode);
        }
    }

    Ok(())
}
