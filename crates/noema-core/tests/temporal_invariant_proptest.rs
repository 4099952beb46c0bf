use chrono::{DateTime, TimeZone, Utc};
use noema_core::models::TemporalStamp;
use proptest::prelude::*;

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000_i64..1_900_000_000_i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

proptest! {
    /// P1: for every stamp, valid_at <= invalid_at whenever invalid_at is set.
    #[test]
    fn p1_valid_at_never_exceeds_invalid_at(
        created in arb_timestamp(),
        valid in arb_timestamp(),
        maybe_invalid in proptest::option::of(arb_timestamp()),
    ) {
        let stamp = TemporalStamp {
            created_at: created,
            valid_at: valid,
            invalid_at: maybe_invalid,
        };
        if let Some(invalid_at) = stamp.invalid_at {
            prop_assert_eq!(stamp.satisfies_i1(), valid <= invalid_at);
        } else {
            prop_assert!(stamp.satisfies_i1());
        }
    }

    /// Point-in-time membership only ever returns true inside [valid_at, invalid_at).
    #[test]
    fn point_in_time_membership_is_bounded(
        valid in arb_timestamp(),
        invalid in arb_timestamp(),
        probe in arb_timestamp(),
    ) {
        prop_assume!(valid <= invalid);
        let stamp = TemporalStamp { created_at: valid, valid_at: valid, invalid_at: Some(invalid) };
        let expected = valid <= probe && probe < invalid;
        prop_assert_eq!(stamp.valid_at_instant(probe), expected);
    }
}
