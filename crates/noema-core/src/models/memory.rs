use super::temporal::TemporalStamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A summarized user/agent exchange derived from one or more messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub key: Option<String>,
    pub content: String,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub conversation_id: String,
    /// The episode open at ingestion time, if any (C10: `conversations(id)`
    /// resolves episodes to the Memory documents carrying this field).
    #[serde(default)]
    pub episode_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub temporal: TemporalStamp,
}
