use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub min_compression_ratio: f64,
    /// Supplemented feature (§11): off by default so it never changes
    /// behavior a caller didn't opt into.
    pub auto_tune: bool,
    pub tuning_interval: u32,
    pub tuning_raise_threshold: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        CompactionConfig {
            min_compression_ratio: 0.5,
            auto_tune: false,
            tuning_interval: 100,
            tuning_raise_threshold: 0.3,
        }
    }
}
