//! Variance classification of installer readings against device readings.
//!
//! Thresholds are fixed: above 10% the installation is rejected outright,
//! below 5% it is advisory pre-verified, anything in between waits for a human.

use serde::{Deserialize, Serialize};

/// Variance strictly above this percentage auto-rejects.
pub const AUTO_REJECT_THRESHOLD_PCT: f64 = 10.0;

/// Variance strictly below this percentage pre-verifies.
pub const PRE_VERIFY_THRESHOLD_PCT: f64 = 5.0;

/// Outcome of comparing the two readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// The device has not reported a usable reading yet
    NoData,
    /// Variance below 5%
    PreVerified { variance: f64 },
    /// Variance between 5% and 10% inclusive
    NeedsManualReview { variance: f64 },
    /// Variance above 10%
    AutoReject { variance: f64 },
}

impl Classification {
    pub fn variance(&self) -> Option<f64> {
        match self {
            Self::NoData => None,
            Self::PreVerified { variance }
            | Self::NeedsManualReview { variance }
            | Self::AutoReject { variance } => Some(*variance),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::PreVerified { .. } => "pre_verified",
            Self::NeedsManualReview { .. } => "needs_manual_review",
            Self::AutoReject { .. } => "auto_reject",
        }
    }
}

/// Percentage variance of `server` relative to the installer's `user` reading.
///
/// Asymmetric: normalized against the installer value, not the mean.
pub fn variance(user: f64, server: f64) -> f64 {
    (server - user).abs() * 100.0 / user
}

/// Classify a pair of readings. `user` must be positive.
///
/// A missing or non-positive server reading means "no data yet", never a
/// valid zero measurement.
pub fn classify(user: f64, server: Option<f64>) -> Classification {
    let Some(server) = server.filter(|s| *s > 0.0) else {
        return Classification::NoData;
    };

    let variance = variance(user, server);
    if variance > AUTO_REJECT_THRESHOLD_PCT {
        Classification::AutoReject { variance }
    } else if variance < PRE_VERIFY_THRESHOLD_PCT {
        Classification::PreVerified { variance }
    } else {
        Classification::NeedsManualReview { variance }
    }
}

/// Reason recorded on installations flagged by reconciliation.
pub fn auto_reject_reason(variance: f64) -> String {
    format!("Auto-rejected: variance {variance:.2}% > {AUTO_REJECT_THRESHOLD_PCT:.0}%")
}
