//! Device domain model.
//!
//! Devices are physical sensors registered in the master registry by bulk
//! import. They are never deleted by this crate; installations only move their
//! status forward (or back to `pending` when an installation is deleted).

use serde::{Deserialize, Serialize};

/// Lifecycle status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Imported but not yet installed
    #[default]
    Pending,
    /// An installation exists and awaits verification
    Installed,
    /// The installation was approved
    Verified,
    /// The installation was rejected, by a human or automatically
    Flagged,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Installed => "installed",
            Self::Verified => "verified",
            Self::Flagged => "flagged",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "installed" => Ok(Self::Installed),
            "verified" => Ok(Self::Verified),
            "flagged" => Ok(Self::Flagged),
            other => Err(format!("unknown device status: {other}")),
        }
    }
}

/// A sensor device from the master registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Globally unique hardware identifier
    pub id: String,
    /// Owning team, if the device has been allocated to one
    #[serde(default)]
    pub team_id: Option<String>,
    /// Shipping box the device arrived in
    #[serde(default)]
    pub box_number: Option<String>,
    /// Whether the owning team has marked the box as opened
    #[serde(default)]
    pub box_opened: bool,
    /// Exclusive installer lock
    #[serde(default)]
    pub assigned_installer_id: Option<String>,
    #[serde(default)]
    pub status: DeviceStatus,
}

impl Device {
    /// Create an unboxed, unassigned device.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            team_id: None,
            box_number: None,
            box_opened: false,
            assigned_installer_id: None,
            status: DeviceStatus::Pending,
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn in_box(mut self, box_number: impl Into<String>, opened: bool) -> Self {
        self.box_number = Some(box_number.into());
        self.box_opened = opened;
        self
    }

    pub fn assigned_to(mut self, installer_id: impl Into<String>) -> Self {
        self.assigned_installer_id = Some(installer_id.into());
        self
    }

    /// Devices in a box may only be installed once the box is opened.
    pub fn is_box_gated(&self) -> bool {
        self.box_number.is_some() && !self.box_opened
    }
}
