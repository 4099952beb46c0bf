//! Feedback loop every `tuning_interval` compactions: raise the window-size
//! threshold when the summary/source compression ratio keeps missing its
//! floor (§11, supplemented from the teacher's consolidation auto-tuner).

/// Outcome of one compaction, fed into the auto-tuner.
#[derive(Debug, Clone, Copy)]
pub struct CompactionAssessment {
    pub compression_ratio: f64,
    pub met_floor: bool,
}

/// Tunable state for the compaction pipeline's "is this window worth
/// compacting" decision.
#[derive(Debug, Clone)]
pub struct TunableThresholds {
    pub window_messages: usize,
    pub events_since_tuning: u32,
}

impl TunableThresholds {
    pub fn new(window_messages: usize) -> Self {
        TunableThresholds { window_messages, events_since_tuning: 0 }
    }
}

/// An adjustment made by the auto-tuner.
#[derive(Debug, Clone)]
pub struct TuningAdjustment {
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
}

/// Checks whether `tuning_interval` compactions have elapsed and, if so,
/// raises `window_messages` when the floor-miss rate exceeds
/// `raise_threshold`. Returns any adjustment made (empty if no tuning ran).
pub fn maybe_tune(
    thresholds: &mut TunableThresholds,
    recent: &[CompactionAssessment],
    tuning_interval: u32,
    raise_threshold: f64,
) -> Vec<TuningAdjustment> {
    thresholds.events_since_tuning += 1;
    if thresholds.events_since_tuning < tuning_interval {
        return Vec::new();
    }
    thresholds.events_since_tuning = 0;
    tune(thresholds, recent, raise_threshold)
}

fn tune(thresholds: &mut TunableThresholds, recent: &[CompactionAssessment], raise_threshold: f64) -> Vec<TuningAdjustment> {
    if recent.is_empty() {
        return Vec::new();
    }
    let misses = recent.iter().filter(|a| !a.met_floor).count();
    let total = recent.len();
    if misses as f64 / total as f64 <= raise_threshold {
        return Vec::new();
    }
    let old = thresholds.window_messages as f64;
    thresholds.window_messages += (thresholds.window_messages / 4).max(1);
    vec![TuningAdjustment {
        parameter: "window_messages".to_string(),
        old_value: old,
        new_value: thresholds.window_messages as f64,
        reason: format!("compression ratio missed the floor in {misses}/{total} compactions"),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(met_floor: bool) -> CompactionAssessment {
        CompactionAssessment { compression_ratio: if met_floor { 0.3 } else { 0.9 }, met_floor }
    }

    #[test]
    fn no_tuning_before_interval() {
        let mut thresholds = TunableThresholds::new(20);
        let adjustments = maybe_tune(&mut thresholds, &[], 100, 0.3);
        assert!(adjustments.is_empty());
        assert_eq!(thresholds.events_since_tuning, 1);
    }

    #[test]
    fn raises_window_when_floor_miss_rate_exceeds_threshold() {
        let mut thresholds = TunableThresholds { window_messages: 20, events_since_tuning: 99 };
        let recent: Vec<_> = (0..10).map(|i| assessment(i < 3)).collect();
        let adjustments = maybe_tune(&mut thresholds, &recent, 100, 0.3);
        assert!(!adjustments.is_empty());
        assert!(thresholds.window_messages > 20);
    }

    #[test]
    fn does_not_tune_when_floor_miss_rate_is_acceptable() {
        let mut thresholds = TunableThresholds { window_messages: 20, events_since_tuning: 99 };
        let recent: Vec<_> = (0..10).map(|i| assessment(i < 9)).collect();
        let adjustments = maybe_tune(&mut thresholds, &recent, 100, 0.3);
        assert!(adjustments.is_empty());
        assert_eq!(thresholds.window_messages, 20);
    }
}
