use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_id: String,
    /// System-wide embedding dimension D (reference default 1024, §4.2).
    pub dimension: usize,
    pub cache_capacity: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            model_id: "default".to_string(),
            dimension: 1024,
            cache_capacity: 10_000,
        }
    }
}
