use super::temporal::TemporalStamp;
use serde::{Deserialize, Serialize};

/// A summary node replacing many messages rolled up by the compaction
/// engine (C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionRecord {
    pub key: Option<String>,
    #[serde(default)]
    pub conversation_id: String,
    pub source_keys: Vec<String>,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub temporal: TemporalStamp,
}
