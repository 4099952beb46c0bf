use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file path, or `:memory:` for an ephemeral in-process database.
    pub database_path: String,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: ":memory:".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 50,
        }
    }
}
