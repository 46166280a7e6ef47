//! Which installations are due for another reconciliation pass.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::classification::PRE_VERIFY_THRESHOLD_PCT;
use super::installation::{Installation, InstallationStatus};

/// Which population a scheduler watches and how long it lets results age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum StalenessProfile {
    /// An installer's own session polling their fresh pending submissions
    InstallerSession {
        installer_id: String,
        window_secs: i64,
    },
    /// Verifier dashboards nudging stale high-variance or no-data items
    Dashboard {
        team_id: Option<String>,
        window_secs: i64,
    },
}

impl StalenessProfile {
    pub fn window(&self) -> Duration {
        match self {
            Self::InstallerSession { window_secs, .. } | Self::Dashboard { window_secs, .. } => {
                Duration::seconds(*window_secs)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InstallerSession { .. } => "installer_session",
            Self::Dashboard { .. } => "dashboard",
        }
    }

    /// Whether an installation belongs to the population this profile watches.
    pub fn in_scope(&self, installation: &Installation) -> bool {
        match self {
            Self::InstallerSession { installer_id, .. } => {
                installation.installed_by == *installer_id
                    && installation.status == InstallationStatus::Pending
            }
            Self::Dashboard { team_id, .. } => team_id
                .as_deref()
                .is_none_or(|team| installation.team_id.as_deref() == Some(team)),
        }
    }
}

/// Whether the readings still need attention: no server data yet, or a
/// variance above the pre-verify threshold.
pub fn needs_attention(installation: &Installation) -> bool {
    installation
        .variance()
        .is_none_or(|v| v > PRE_VERIFY_THRESHOLD_PCT)
}

/// Whether a single installation is due for reconciliation at `now`.
pub fn is_due(installation: &Installation, now: DateTime<Utc>, window: Duration) -> bool {
    if installation.status == InstallationStatus::Verified {
        return false;
    }
    if !needs_attention(installation) {
        return false;
    }
    installation
        .server_refreshed_at
        .is_none_or(|refreshed| now - refreshed > window)
}

/// Select the installations due for reconciliation.
pub fn select_due<'a>(
    installations: &'a [Installation],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<&'a Installation> {
    installations
        .iter()
        .filter(|i| is_due(i, now, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation(server: Option<f64>, refreshed_ago_secs: Option<i64>, now: DateTime<Utc>) -> Installation {
        let mut inst = Installation::new("DEV-1", "inst-1", "1", 100.0);
        inst.latest_dis_cm = server;
        inst.server_refreshed_at = refreshed_ago_secs.map(|s| now - Duration::seconds(s));
        inst
    }

    #[test]
    fn test_never_refreshed_no_data_is_due() {
        let now = Utc::now();
        assert!(is_due(&installation(None, None, now), now, Duration::hours(24)));
    }

    #[test]
    fn test_window_is_strict() {
        let now = Utc::now();
        let window = Duration::seconds(120);
        assert!(!is_due(&installation(None, Some(120), now), now, window));
        assert!(is_due(&installation(None, Some(121), now), now, window));
        assert!(!is_due(&installation(None, Some(30), now), now, window));
    }

    #[test]
    fn test_low_variance_is_never_due() {
        let now = Utc::now();
        let window = Duration::seconds(60);
        assert!(!is_due(&installation(Some(104.0), Some(3600), now), now, window));
        // exactly 5% still counts as settled
        assert!(!is_due(&installation(Some(105.0), Some(3600), now), now, window));
        assert!(is_due(&installation(Some(107.0), Some(3600), now), now, window));
        assert!(is_due(&installation(Some(0.0), Some(3600), now), now, window));
    }

    #[test]
    fn test_verified_is_never_due() {
        let now = Utc::now();
        let mut inst = installation(None, None, now);
        inst.status = InstallationStatus::Verified;
        assert!(!is_due(&inst, now, Duration::zero()));

        inst.status = InstallationStatus::Flagged;
        assert!(is_due(&inst, now, Duration::zero()));
    }

    #[test]
    fn test_select_due_filters_set() {
        let now = Utc::now();
        let set = vec![
            installation(None, None, now),
            installation(Some(101.0), None, now),
            installation(Some(150.0), Some(10), now),
            installation(Some(150.0), Some(100_000), now),
        ];
        let due = select_due(&set, now, Duration::hours(24));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, set[0].id);
        assert_eq!(due[1].id, set[3].id);
    }

    #[test]
    fn test_profile_scope() {
        let now = Utc::now();
        let mut inst = installation(None, None, now);
        inst.team_id = Some("team-a".into());

        let mine = StalenessProfile::InstallerSession {
            installer_id: "inst-1".into(),
            window_secs: 120,
        };
        let theirs = StalenessProfile::InstallerSession {
            installer_id: "inst-2".into(),
            window_secs: 120,
        };
        assert!(mine.in_scope(&inst));
        assert!(!theirs.in_scope(&inst));

        let all = StalenessProfile::Dashboard { team_id: None, window_secs: 86_400 };
        let team_b = StalenessProfile::Dashboard {
            team_id: Some("team-b".into()),
            window_secs: 86_400,
        };
        assert!(all.in_scope(&inst));
        assert!(!team_b.in_scope(&inst));
        assert_eq!(all.window(), Duration::hours(24));
    }
}
