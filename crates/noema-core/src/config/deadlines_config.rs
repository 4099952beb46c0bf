use serde::{Deserialize, Serialize};

/// Default operation deadlines (§5: "search 5s, ingestion 30s, community
/// detection unbounded").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlinesConfig {
    pub search_ms: u64,
    pub ingestion_ms: u64,
    /// `None` means unbounded, called by operators explicitly.
    pub community_detection_ms: Option<u64>,
}

impl Default for DeadlinesConfig {
    fn default() -> Self {
        DeadlinesConfig {
            search_ms: 5_000,
            ingestion_ms: 30_000,
            community_detection_ms: None,
        }
    }
}
