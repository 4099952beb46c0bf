use chrono::{DateTime, Utc};

/// The bi-temporal triple carried by every Message, Memory, Entity-adjacent
/// record, and edge: transaction-time via `created_at` (immutable), and
/// valid-time via `valid_at`/`invalid_at` (mutable through invalidation).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TemporalStamp {
    pub created_at: DateTime<Utc>,
    pub valid_at: DateTime<Utc>,
    pub invalid_at: Option<DateTime<Utc>>,
}

impl TemporalStamp {
    /// Stamps a newly created record: `created_at` and `valid_at` default to
    /// `now`, `valid_at` overridable by the caller, `invalid_at` starts null.
    pub fn new(now: DateTime<Utc>, valid_at: Option<DateTime<Utc>>) -> Self {
        TemporalStamp {
            created_at: now,
            valid_at: valid_at.unwrap_or(now),
            invalid_at: None,
        }
    }

    /// I1: `valid_at <= invalid_at` whenever `invalid_at` is set.
    pub fn satisfies_i1(&self) -> bool {
        match self.invalid_at {
            Some(end) => self.valid_at <= end,
            None => true,
        }
    }

    pub fn is_current(&self) -> bool {
        self.invalid_at.is_none()
    }

    /// Point-in-time membership test: `valid_at <= t < invalid_at` (or
    /// `invalid_at` unset).
    pub fn valid_at_instant(&self, t: DateTime<Utc>) -> bool {
        self.valid_at <= t && self.invalid_at.map(|end| end > t).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn point_in_time_membership() {
        let stamp = TemporalStamp {
            created_at: ts(2024, 1, 1),
            valid_at: ts(2024, 1, 1),
            invalid_at: Some(ts(2024, 7, 1)),
        };
        assert!(stamp.valid_at_instant(ts(2024, 6, 1)));
        assert!(!stamp.valid_at_instant(ts(2024, 8, 1)));
    }

    #[test]
    fn still_current_matches_any_instant_after_valid_at() {
        let stamp = TemporalStamp::new(ts(2024, 1, 1), None);
        assert!(stamp.valid_at_instant(ts(2030, 1, 1)));
    }

    #[test]
    fn i1_violation_detected() {
        let stamp = TemporalStamp {
            created_at: ts(2024, 1, 1),
            valid_at: ts(2024, 7, 1),
            invalid_at: Some(ts(2024, 1, 1)),
        };
        assert!(!stamp.satisfies_i1());
    }
}
