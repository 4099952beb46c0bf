use super::temporal::TemporalStamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// A single conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub key: Option<String>,
    pub role: Role,
    pub content: String,
    pub conversation_id: String,
    pub episode_id: Option<String>,
    pub embedding: Vec<f32>,
    pub temporal: TemporalStamp,
    pub previous_message_key: Option<String>,
}
