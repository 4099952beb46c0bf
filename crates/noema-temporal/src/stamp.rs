use chrono::{DateTime, Utc};
use noema_core::models::TemporalStamp;

/// Stamps a newly created document or edge (§4.4): `created_at` is the
/// current wall clock and immutable, `valid_at` defaults to it unless the
/// caller overrides it, `invalid_at` starts null.
pub fn stamp_new(now: DateTime<Utc>, valid_at: Option<DateTime<Utc>>) -> TemporalStamp {
    TemporalStamp::new(now, valid_at)
}
