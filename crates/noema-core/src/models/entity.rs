use super::confidence::Confidence;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named thing extracted from text. `entity_type` is deliberately a
/// free-form bounded string rather than a closed enum (§9: "Dynamic
/// extraction outputs" — the external LLM's type vocabulary is not fixed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub key: Option<String>,
    pub name: String,
    pub entity_type: String,
    pub embedding: Vec<f32>,
    pub community_id: Option<String>,
    pub confidence: Confidence,
    /// Role-specific fields an upsert may merge into (§4.5: "merge extra
    /// fields — new wins for scalars, union for lists").
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Maximum length accepted for a free-form entity type or name (§9: "length
/// bound" on validated extraction output).
pub const MAX_ENTITY_FIELD_LEN: usize = 256;

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Entity {
            key: None,
            name: name.into(),
            entity_type: entity_type.into(),
            embedding: Vec::new(),
            community_id: None,
            confidence: Confidence::new(0.5),
            extra: HashMap::new(),
        }
    }

    /// Identity key for upsert matching: `(name, type)`.
    pub fn identity(&self) -> (&str, &str) {
        (&self.name, &self.entity_type)
    }
}
