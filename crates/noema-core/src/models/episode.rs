use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, time-bounded grouping of conversations for retrieval scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub key: Option<String>,
    pub title: String,
    pub event_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub conversation_count: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Episode {
    pub fn open(title: impl Into<String>, event_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Episode {
            key: None,
            title: title.into(),
            event_type: event_type.into(),
            start_time: now,
            end_time: None,
            is_active: true,
            conversation_count: 0,
            metadata: HashMap::new(),
        }
    }
}

/// Result of `close()` on an episode, distinguishing an idempotent no-op
/// from a genuine state transition (§4.10: "typed already-closed signal, not
/// an error").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AlreadyClosed,
}
