pub mod auto_tuning;

pub use auto_tuning::{maybe_tune, CompactionAssessment, TunableThresholds, TuningAdjustment};
