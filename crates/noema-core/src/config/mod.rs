mod compaction_config;
mod deadlines_config;
mod embedding_config;
mod graph_config;
mod search_config;
mod storage_config;

pub use compaction_config::CompactionConfig;
pub use deadlines_config::DeadlinesConfig;
pub use embedding_config::EmbeddingConfig;
pub use graph_config::GraphConfig;
pub use search_config::SearchConfig;
pub use storage_config::StorageConfig;

use serde::{Deserialize, Serialize};

/// A single configuration object aggregating every subsystem's knobs
/// (§6), the way `cortex-core::config::CortexConfig` aggregates its own
/// per-subsystem structs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoemaConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub graph: GraphConfig,
    pub search: SearchConfig,
    pub deadlines: DeadlinesConfig,
    pub compaction: CompactionConfig,
}

impl NoemaConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let config = NoemaConfig::default();
        let text = config.to_toml().expect("serialize");
        let parsed = NoemaConfig::from_toml(&text).expect("parse");
        assert_eq!(parsed.embedding.dimension, config.embedding.dimension);
        assert_eq!(parsed.search.rrf_k0, config.search.rrf_k0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = NoemaConfig::from_toml("[graph]\ncommunity_min_size = 3\n").expect("parse");
        assert_eq!(config.graph.community_min_size, 3);
        assert_eq!(config.search.rrf_k0, SearchConfig::default().rrf_k0);
    }
}
