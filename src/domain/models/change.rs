//! Change notifications published by stores after committed writes.

use serde::Serialize;
use uuid::Uuid;

use super::device::Device;
use super::installation::Installation;

/// A committed change to a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    InstallationCreated(Installation),
    InstallationUpdated(Installation),
    InstallationDeleted {
        id: Uuid,
        device_id: String,
        team_id: Option<String>,
        installed_by: String,
    },
    DeviceUpdated(Device),
}

/// Coarse event kind, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    InstallationCreated,
    InstallationUpdated,
    InstallationDeleted,
    DeviceUpdated,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::InstallationCreated(_) => ChangeKind::InstallationCreated,
            Self::InstallationUpdated(_) => ChangeKind::InstallationUpdated,
            Self::InstallationDeleted { .. } => ChangeKind::InstallationDeleted,
            Self::DeviceUpdated(_) => ChangeKind::DeviceUpdated,
        }
    }

    fn team_id(&self) -> Option<&str> {
        match self {
            Self::InstallationCreated(i) | Self::InstallationUpdated(i) => i.team_id.as_deref(),
            Self::InstallationDeleted { team_id, .. } => team_id.as_deref(),
            Self::DeviceUpdated(d) => d.team_id.as_deref(),
        }
    }

    fn installed_by(&self) -> Option<&str> {
        match self {
            Self::InstallationCreated(i) | Self::InstallationUpdated(i) => {
                Some(i.installed_by.as_str())
            }
            Self::InstallationDeleted { installed_by, .. } => Some(installed_by.as_str()),
            Self::DeviceUpdated(_) => None,
        }
    }
}

/// Subscription filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    pub kinds: Vec<ChangeKind>,
    pub team_id: Option<String>,
    pub installed_by: Option<String>,
}

impl ChangeFilter {
    pub fn installations_by(installer_id: impl Into<String>) -> Self {
        Self {
            kinds: vec![
                ChangeKind::InstallationCreated,
                ChangeKind::InstallationUpdated,
                ChangeKind::InstallationDeleted,
            ],
            installed_by: Some(installer_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind()) {
            return false;
        }
        if let Some(team) = &self.team_id {
            if event.team_id() != Some(team.as_str()) {
                return false;
            }
        }
        if let Some(installer) = &self.installed_by {
            if event.installed_by() != Some(installer.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let mut inst = Installation::new("DEV-1", "inst-1", "1", 10.0);
        inst.team_id = Some("team-a".into());
        let created = ChangeEvent::InstallationCreated(inst);
        let device = ChangeEvent::DeviceUpdated(Device::new("DEV-1").with_team("team-a"));

        assert!(ChangeFilter::default().matches(&created));
        assert!(ChangeFilter::installations_by("inst-1").matches(&created));
        assert!(!ChangeFilter::installations_by("inst-2").matches(&created));
        assert!(!ChangeFilter::installations_by("inst-1").matches(&device));

        let team_b = ChangeFilter { team_id: Some("team-b".into()), ..Default::default() };
        assert!(!team_b.matches(&created));
        let team_a = ChangeFilter { team_id: Some("team-a".into()), ..Default::default() };
        assert!(team_a.matches(&device));
    }
}
