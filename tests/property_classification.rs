use chrono::{Duration, Utc};
use installtrack::domain::models::classification::{
    auto_reject_reason, classify, variance, AUTO_REJECT_THRESHOLD_PCT, PRE_VERIFY_THRESHOLD_PCT,
};
use installtrack::domain::models::staleness::is_due;
use installtrack::domain::models::{Classification, Installation, InstallationStatus};
use proptest::prelude::*;

proptest! {
    /// Property: a missing or non-positive device reading is always "no data"
    #[test]
    fn prop_non_positive_server_is_no_data(
        user in 0.1f64..10_000.0,
        server in -10_000.0f64..=0.0,
    ) {
        prop_assert_eq!(classify(user, None), Classification::NoData);
        prop_assert_eq!(classify(user, Some(server)), Classification::NoData);
    }

    /// Property: classification is deterministic and agrees with the thresholds
    #[test]
    fn prop_classification_matches_thresholds(
        user in 0.1f64..10_000.0,
        server in 0.1f64..10_000.0,
    ) {
        let first = classify(user, Some(server));
        prop_assert_eq!(first.clone(), classify(user, Some(server)));

        let v = variance(user, server);
        prop_assert!(v >= 0.0);
        match first {
            Classification::PreVerified { variance } => {
                prop_assert!(variance < PRE_VERIFY_THRESHOLD_PCT);
                prop_assert_eq!(variance, v);
            }
            Classification::NeedsManualReview { variance } => {
                prop_assert!(variance >= PRE_VERIFY_THRESHOLD_PCT);
                prop_assert!(variance <= AUTO_REJECT_THRESHOLD_PCT);
            }
            Classification::AutoReject { variance } => {
                prop_assert!(variance > AUTO_REJECT_THRESHOLD_PCT);
                let reason = auto_reject_reason(variance);
                let expected = format!("{variance:.2}%");
                prop_assert!(reason.contains(&expected));
            }
            Classification::NoData => prop_assert!(false, "positive readings always classify"),
        }
    }

    /// Property: the classification only depends on the ratio of the readings
    #[test]
    fn prop_classification_is_scale_invariant(
        pct in 0u32..300,
        scale in prop::sample::select(vec![1.0f64, 2.0, 4.0, 0.5, 0.25]),
    ) {
        // pct is in quarter percent steps; powers of two keep the arithmetic exact.
        let user = 400.0;
        let server = user + f64::from(pct);
        let base = classify(user, Some(server));
        let scaled = classify(user * scale, Some(server * scale));
        prop_assert_eq!(base.as_str(), scaled.as_str());
    }

    /// Property: verified installations are never due, whatever their readings
    #[test]
    fn prop_verified_never_due(
        server in prop::option::of(0.0f64..500.0),
        refreshed_ago in prop::option::of(0i64..1_000_000),
        window in 1i64..100_000,
    ) {
        let now = Utc::now();
        let mut installation = Installation::new("DEV-1", "inst-1", "1", 100.0);
        installation.status = InstallationStatus::Verified;
        installation.latest_dis_cm = server;
        installation.server_refreshed_at = refreshed_ago.map(|s| now - Duration::seconds(s));
        prop_assert!(!is_due(&installation, now, Duration::seconds(window)));
    }
}
