//! Installation CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{or_dash, output, table, truncate, CommandOutput};
use crate::cli::{ActorArgs, AppContext};
use crate::domain::models::{
    EditableField, Installation, InstallationStatus, NewImage, ProposedEdit, ReadingUnit,
};
use crate::domain::ports::InstallationFilters;
use crate::services::{EditOutcome, ReconcileOutcome, ReconcileReport, SubmitInstallation};

#[derive(Args, Debug)]
pub struct InstallationArgs {
    #[command(subcommand)]
    pub command: InstallationCommands,
}

#[derive(Subcommand, Debug)]
pub enum InstallationCommands {
    /// Record a new installation
    Submit {
        #[arg(long)]
        device: String,
        #[arg(long)]
        location: String,
        /// Distance reading taken by the installer
        #[arg(long)]
        reading: f64,
        /// cm, mm, m or in
        #[arg(long, default_value = "cm")]
        unit: ReadingUnit,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// List installations
    List {
        /// pending, verified or flagged
        #[arg(long)]
        status: Option<InstallationStatus>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        installer: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show one installation with its edit history
    Show { id: Uuid },
    /// Approve an installation
    Approve {
        id: Uuid,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Reject an installation
    Reject {
        id: Uuid,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Delete an installation, returning its device to pending
    Delete {
        id: Uuid,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Apply a verifier edit; replaced values are kept in the history
    Edit {
        id: Uuid,
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        reading: Option<f64>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Remove both coordinates
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        clear_coordinates: bool,
        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Compare the installer reading with the device's latest telemetry now
    Reconcile {
        id: Uuid,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Move every matching installation to a new location
    ReassignLocation {
        /// Current location to move from
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        status: Option<InstallationStatus>,
        #[arg(long)]
        team: Option<String>,
        /// New location id
        #[arg(long)]
        to: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
}

// -- Output types --

#[derive(Debug, serde::Serialize)]
pub struct InstallationOutput {
    #[serde(flatten)]
    pub installation: Installation,
}

impl CommandOutput for InstallationOutput {
    fn to_human(&self) -> String {
        let i = &self.installation;
        let mut lines = vec![
            format!("Installation: {}", i.id),
            format!("Device: {}", i.device_id),
            format!("Status: {}", i.status),
            format!("Location: {}", i.location_id),
            format!("Installed by: {} ({})", i.installed_by_name, i.installed_by),
            format!("Sensor reading: {} cm", i.sensor_reading),
            format!("Device reading: {}", or_dash(i.latest_dis_cm)),
            format!("Variance: {}", or_dash(i.variance().map(|v| format!("{v:.2}%")))),
        ];
        if i.system_pre_verified {
            lines.push("Pre-verified by system".to_string());
        }
        if let Some(ref reason) = i.flagged_reason {
            lines.push(format!("Flagged: {reason}"));
        }
        if let Some(ref original) = i.original_location_id {
            lines.push(format!("Original location: {original}"));
        }
        if let (Some(lat), Some(lon)) = (i.latitude, i.longitude) {
            lines.push(format!("Coordinates: {lat}, {lon}"));
        }
        if !i.tags.is_empty() {
            let tags: Vec<&str> = i.tags.iter().map(String::as_str).collect();
            lines.push(format!("Tags: {}", tags.join(", ")));
        }
        for url in &i.image_urls {
            lines.push(format!("Image: {url}"));
        }
        if !i.history.is_empty() {
            lines.push(String::new());
            lines.push("History:".to_string());
            lines.push(history_table(i));
        }
        lines.push(format!("Created: {}", i.created_at.to_rfc3339()));
        lines.push(format!("Updated: {}", i.updated_at.to_rfc3339()));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn history_table(installation: &Installation) -> String {
    let rows = EditableField::ALL.iter().flat_map(|field| {
        installation
            .history
            .versions(*field)
            .iter()
            .enumerate()
            .map(move |(index, value)| {
                vec![field.to_string(), (index + 1).to_string(), value.to_string()]
            })
    });
    table(&["Field", "Version", "Value"], rows)
}

#[derive(Debug, serde::Serialize)]
pub struct InstallationListOutput {
    pub installations: Vec<Installation>,
    pub total: usize,
}

impl CommandOutput for InstallationListOutput {
    fn to_human(&self) -> String {
        if self.installations.is_empty() {
            return "No installations found.".to_string();
        }
        let rows = self.installations.iter().map(|i| {
            vec![
                i.id.to_string()[..8].to_string(),
                truncate(&i.device_id, 20),
                i.status.to_string(),
                i.location_id.clone(),
                truncate(&i.installed_by_name, 20),
                format!("{}", i.sensor_reading),
                or_dash(i.latest_dis_cm),
                or_dash(i.variance().map(|v| format!("{v:.2}%"))),
            ]
        });
        format!(
            "{}\n{} installation(s)",
            table(
                &["ID", "Device", "Status", "Location", "Installer", "Reading", "Telemetry", "Variance"],
                rows
            ),
            self.total
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EditOutput {
    pub outcome: EditOutcome,
}

impl CommandOutput for EditOutput {
    fn to_human(&self) -> String {
        match &self.outcome {
            EditOutcome::NoChanges { installation } => {
                format!("No changes to installation {}", installation.id)
            }
            EditOutcome::Applied {
                changes,
                installation,
            } => {
                let rows = changes.iter().map(|c| {
                    vec![
                        c.field.to_string(),
                        c.previous.to_string(),
                        c.proposed.to_string(),
                        c.version.to_string(),
                    ]
                });
                let mut text = format!("Edited installation {}", installation.id);
                if !changes.is_empty() {
                    text.push('\n');
                    text.push_str(&table(&["Field", "Previous", "New", "Version"], rows));
                }
                if let Some(url) = installation.image_urls.last() {
                    text.push_str(&format!("\nLatest image: {url}"));
                }
                text
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.outcome).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReconcileOutput {
    #[serde(flatten)]
    pub report: ReconcileReport,
}

impl CommandOutput for ReconcileOutput {
    fn to_human(&self) -> String {
        let id = self.report.installation.id;
        match &self.report.outcome {
            ReconcileOutcome::NoData => format!("Installation {id}: device has not reported yet"),
            ReconcileOutcome::Classified { classification } => {
                let variance = or_dash(classification.variance().map(|v| format!("{v:.2}%")));
                format!(
                    "Installation {id}: {} (variance {variance})",
                    classification.as_str()
                )
            }
            ReconcileOutcome::Deferred { reason } => {
                format!("Installation {id}: telemetry unavailable, will retry ({reason})")
            }
            ReconcileOutcome::AlreadyVerified => {
                format!("Installation {id}: already verified, nothing to do")
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct InstallationActionOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for InstallationActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// -- Execute --

pub async fn execute(args: InstallationArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let service = ctx.installation_service();

    match args.command {
        InstallationCommands::Submit {
            device,
            location,
            reading,
            unit,
            lat,
            lon,
            actor,
        } => {
            let request = SubmitInstallation {
                device_id: device,
                location_id: location,
                sensor_reading: reading,
                unit,
                latitude: lat,
                longitude: lon,
            };
            let installation = service.submit(request, &actor.actor()).await?;
            output(&InstallationOutput { installation }, json_mode);
        }

        InstallationCommands::List {
            status,
            team,
            installer,
            location,
            limit,
        } => {
            let installations = service
                .list(InstallationFilters {
                    status,
                    team_id: team,
                    installed_by: installer,
                    location_id: location,
                    limit,
                    ..Default::default()
                })
                .await?;
            let out = InstallationListOutput {
                total: installations.len(),
                installations,
            };
            output(&out, json_mode);
        }

        InstallationCommands::Show { id } => {
            let installation = service.get(id).await?;
            output(&InstallationOutput { installation }, json_mode);
        }

        InstallationCommands::Approve { id, actor } => {
            let installation = service.approve(id, &actor.actor()).await?;
            output(&InstallationOutput { installation }, json_mode);
        }

        InstallationCommands::Reject { id, reason, actor } => {
            let installation = service.reject(id, &reason, &actor.actor()).await?;
            output(&InstallationOutput { installation }, json_mode);
        }

        InstallationCommands::Delete { id, actor } => {
            let removed = service.delete(id, &actor.actor()).await?;
            let out = InstallationActionOutput {
                success: true,
                message: format!(
                    "Deleted installation {id}; device {} is pending again",
                    removed.device_id
                ),
            };
            output(&out, json_mode);
        }

        InstallationCommands::Edit {
            id,
            device,
            reading,
            location,
            lat,
            lon,
            clear_coordinates,
            image,
            actor,
        } => {
            let image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            let (latitude, longitude) = if clear_coordinates {
                (Some(None), Some(None))
            } else {
                (lat.map(Some), lon.map(Some))
            };
            let proposal = ProposedEdit {
                device_id: device,
                sensor_reading: reading,
                location_id: location,
                latitude,
                longitude,
                image,
            };
            let outcome = ctx
                .audit_service()
                .apply_edit(id, proposal, &actor.actor())
                .await?;
            output(&EditOutput { outcome }, json_mode);
        }

        InstallationCommands::Reconcile { id, actor } => {
            let report = ctx
                .reconciliation_engine()?
                .reconcile_as(id, &actor.actor())
                .await?;
            output(&ReconcileOutput { report }, json_mode);
        }

        InstallationCommands::ReassignLocation {
            from,
            status,
            team,
            to,
            actor,
        } => {
            let filters = InstallationFilters {
                status,
                team_id: team,
                location_id: from,
                ..Default::default()
            };
            let updated = ctx
                .reassigner()
                .reassign_location(filters, &to, &actor.actor())
                .await?;
            let out = InstallationActionOutput {
                success: true,
                message: format!("Moved {updated} installation(s) to location {to}"),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

async fn read_image(path: &Path) -> Result<NewImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(NewImage {
        content_type: content_type_for(path).to_string(),
        file_name,
        bytes,
    })
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
