//! Installation eligibility rules and the actors they apply to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::device::Device;
use super::installation::Installation;

/// Role of the caller, as resolved by the external authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May install any device of their team
    Installer,
    /// May only install devices explicitly assigned to them
    ScopedInstaller,
    Verifier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installer => "installer",
            Self::ScopedInstaller => "scoped_installer",
            Self::Verifier => "verifier",
            Self::Admin => "admin",
        }
    }

    pub fn requires_device_assignment(&self) -> bool {
        matches!(self, Self::ScopedInstaller)
    }

    pub fn can_submit(&self) -> bool {
        matches!(self, Self::Installer | Self::ScopedInstaller)
    }

    /// Approve, reject, edit, delete and trigger reconciliation.
    pub fn can_verify(&self) -> bool {
        matches!(self, Self::Verifier | Self::Admin)
    }

    pub fn can_administer(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "installer" => Ok(Self::Installer),
            "scoped_installer" => Ok(Self::ScopedInstaller),
            "verifier" => Ok(Self::Verifier),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub team_id: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team_id: None,
            role,
        }
    }

    pub fn in_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }
}

/// Reasons a device may not receive a new installation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("Device {0} is not in the device registry")]
    DeviceNotFound(String),

    #[error("Device belongs to team {device_team}, installer belongs to team {installer_team}")]
    TeamMismatch {
        device_team: String,
        installer_team: String,
    },

    #[error("Device {0} has not been assigned to any installer")]
    InstallerNotAssigned(String),

    #[error("Device {device_id} is assigned to another installer")]
    AssignedToOtherInstaller { device_id: String },

    #[error("Box {box_number} containing device {device_id} has not been opened")]
    BoxNotOpened {
        device_id: String,
        box_number: String,
    },

    #[error("Device {0} already has an installation")]
    AlreadyInstalled(String),
}

impl EligibilityError {
    /// Short human-facing title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::DeviceNotFound(_) => "Device not found",
            Self::TeamMismatch { .. } => "Wrong team",
            Self::InstallerNotAssigned(_) => "Device not assigned",
            Self::AssignedToOtherInstaller { .. } => "Assigned to another installer",
            Self::BoxNotOpened { .. } => "Box not opened",
            Self::AlreadyInstalled(_) => "Already installed",
        }
    }
}

/// Everything the eligibility check reads, captured as one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityCheck<'a> {
    /// The device looked up by id, or `None` if it is not registered
    pub device: Option<&'a Device>,
    pub device_id: &'a str,
    pub installer_id: &'a str,
    pub installer_team_id: Option<&'a str>,
    pub requires_assignment: bool,
    /// An installation already referencing the device, if any
    pub existing: Option<&'a Installation>,
}

/// Decide whether an installation may be created. Checks run in a fixed order
/// and the first failure wins.
pub fn validate(check: &EligibilityCheck<'_>) -> Result<(), EligibilityError> {
    let device = check
        .device
        .ok_or_else(|| EligibilityError::DeviceNotFound(check.device_id.to_string()))?;

    if let (Some(device_team), Some(installer_team)) =
        (device.team_id.as_deref(), check.installer_team_id)
    {
        if device_team != installer_team {
            return Err(EligibilityError::TeamMismatch {
                device_team: device_team.to_string(),
                installer_team: installer_team.to_string(),
            });
        }
    }

    if check.requires_assignment {
        match device.assigned_installer_id.as_deref() {
            None => return Err(EligibilityError::InstallerNotAssigned(device.id.clone())),
            Some(assigned) if assigned != check.installer_id => {
                return Err(EligibilityError::AssignedToOtherInstaller {
                    device_id: device.id.clone(),
                });
            }
            Some(_) => {}
        }
    }

    if let Some(box_number) = device.box_number.as_deref() {
        if !device.box_opened {
            return Err(EligibilityError::BoxNotOpened {
                device_id: device.id.clone(),
                box_number: box_number.to_string(),
            });
        }
    }

    if check.existing.is_some() {
        return Err(EligibilityError::AlreadyInstalled(device.id.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<'a>(device: Option<&'a Device>, existing: Option<&'a Installation>) -> EligibilityCheck<'a> {
        EligibilityCheck {
            device,
            device_id: "DEV-1",
            installer_id: "inst-1",
            installer_team_id: Some("team-a"),
            requires_assignment: false,
            existing,
        }
    }

    #[test]
    fn test_eligible_device_passes() {
        let device = Device::new("DEV-1").with_team("team-a").in_box("B1", true);
        assert_eq!(validate(&check(Some(&device), None)), Ok(()));
    }

    #[test]
    fn test_missing_device() {
        assert_eq!(
            validate(&check(None, None)),
            Err(EligibilityError::DeviceNotFound("DEV-1".into()))
        );
    }

    #[test]
    fn test_team_mismatch_only_when_both_set() {
        let device = Device::new("DEV-1").with_team("team-b");
        assert!(matches!(
            validate(&check(Some(&device), None)),
            Err(EligibilityError::TeamMismatch { .. })
        ));

        let unowned = Device::new("DEV-1");
        assert_eq!(validate(&check(Some(&unowned), None)), Ok(()));

        let mut no_team = check(Some(&device), None);
        no_team.installer_team_id = None;
        assert_eq!(validate(&no_team), Ok(()));
    }

    #[test]
    fn test_assignment_rules() {
        let unassigned = Device::new("DEV-1");
        let mut c = check(Some(&unassigned), None);
        c.requires_assignment = true;
        assert_eq!(
            validate(&c),
            Err(EligibilityError::InstallerNotAssigned("DEV-1".into()))
        );

        let other = Device::new("DEV-1").assigned_to("inst-2");
        let mut c = check(Some(&other), None);
        c.requires_assignment = true;
        assert!(matches!(
            validate(&c),
            Err(EligibilityError::AssignedToOtherInstaller { .. })
        ));

        let mine = Device::new("DEV-1").assigned_to("inst-1");
        let mut c = check(Some(&mine), None);
        c.requires_assignment = true;
        assert_eq!(validate(&c), Ok(()));

        // Assignment to someone else is irrelevant when the role doesn't require it
        assert_eq!(validate(&check(Some(&other), None)), Ok(()));
    }

    #[test]
    fn test_unopened_box_rejects_regardless_of_assignment() {
        let device = Device::new("DEV-1")
            .with_team("team-a")
            .assigned_to("inst-1")
            .in_box("B7", false);
        let mut c = check(Some(&device), None);
        c.requires_assignment = true;
        assert!(matches!(
            validate(&c),
            Err(EligibilityError::BoxNotOpened { .. })
        ));
    }

    #[test]
    fn test_box_check_precedes_already_installed() {
        let device = Device::new("DEV-1").in_box("B7", false);
        let existing = Installation::new("DEV-1", "inst-9", "1", 50.0);
        assert!(matches!(
            validate(&check(Some(&device), Some(&existing))),
            Err(EligibilityError::BoxNotOpened { .. })
        ));
    }

    #[test]
    fn test_already_installed() {
        let device = Device::new("DEV-1");
        let existing = Installation::new("DEV-1", "inst-9", "1", 50.0);
        assert_eq!(
            validate(&check(Some(&device), Some(&existing))),
            Err(EligibilityError::AlreadyInstalled("DEV-1".into()))
        );
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::ScopedInstaller.requires_device_assignment());
        assert!(!Role::Installer.requires_device_assignment());
        assert!(Role::Installer.can_submit());
        assert!(!Role::Verifier.can_submit());
        assert!(Role::Verifier.can_verify());
        assert!(!Role::Verifier.can_administer());
        assert!(Role::Admin.can_administer());
        assert_eq!("scoped-installer".parse::<Role>().unwrap(), Role::ScopedInstaller);
    }
}
