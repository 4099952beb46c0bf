use chrono::{Duration, Utc};
use noema_core::config::{CompactionConfig, EmbeddingConfig};
use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::traits::{Embedder, LlmClient};
use noema_embeddings::cache::EmbeddingCache;
use noema_memory::compaction::CompactionEngine;
use noema_memory::{MemoryAgent, StoreConversationParams};
use noema_graph::{EntityStore, RelationshipStore};
use noema_search::SearchEngine;
use noema_storage::StorageEngine;
use serde_json::Map;
use std::sync::Arc;

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> NoemaResult<Vec<f32>> {
        let mut v = vec![0.0_f32; 8];
        v[0] = text.len() as f32 + 1.0;
        Ok(v)
    }

    fn model_id(&self) -> &str {
        "stub-embedder"
    }
}

struct EchoSummarizer;

impl LlmClient for EchoSummarizer {
    fn complete(&self, prompt: &str, _params: &noema_core::traits::LlmParams) -> NoemaResult<String> {
        Ok(format!("summary of: {}", &prompt[..prompt.len().min(20)]))
    }
}

fn embeddings() -> Arc<EmbeddingCache> {
    Arc::new(EmbeddingCache::new(Arc::new(StubEmbedder), &EmbeddingConfig { dimension: 8, ..Default::default() }))
}

#[tokio::test]
async fn compacts_a_window_and_invalidates_sources() {
    let storage = StorageEngine::open_in_memory().unwrap();
    let pool = storage.pool().clone();
    let embeddings = embeddings();
    let entities = EntityStore::new(pool.clone(), Default::default());
    let relationships = RelationshipStore::new(pool.clone(), Default::default());
    let search = Arc::new(SearchEngine::new(pool.clone(), Default::default()));
    let agent = MemoryAgent::new(pool.clone(), embeddings.clone(), entities, relationships, search, None);
    let deadline = Deadline::unbounded();

    let result = agent
        .store_conversation(
            StoreConversationParams {
                user_msg: "What is the capital of France?".to_string(),
                agent_msg: "Paris.".to_string(),
                conversation_id: Some("conv-1".to_string()),
                episode_id: None,
                metadata: Map::new(),
                reference_time: None,
            },
            deadline,
        )
        .await
        .unwrap();

    let engine = CompactionEngine::new(pool.clone(), embeddings, Arc::new(EchoSummarizer), CompactionConfig::default(), 20);
    let window_start = Utc::now() - Duration::hours(1);
    let window_end = Utc::now() + Duration::hours(1);
    let compaction = engine.compact("conv-1", window_start, window_end, deadline).await.unwrap();

    assert_eq!(compaction.source_keys.len(), 2);
    assert!(compaction.source_keys.contains(&result.user_key));
    assert!(compaction.source_keys.contains(&result.agent_key));

    pool.with_read(|conn| {
        let invalid_at: Option<String> = conn
            .query_row(
                "SELECT invalid_at FROM documents WHERE collection = 'messages' AND key = ?1",
                rusqlite::params![result.user_key],
                |row| row.get::<_, Option<String>>(0),
            )
            .unwrap();
        assert!(invalid_at.is_some());
        Ok(())
    })
    .unwrap();
}

#[tokio::test]
async fn empty_window_is_not_found() {
    let storage = StorageEngine::open_in_memory().unwrap();
    let pool = storage.pool().clone();
    let embeddings = embeddings();
    let engine = CompactionEngine::new(pool, embeddings, Arc::new(EchoSummarizer), CompactionConfig::default(), 20);
    let deadline = Deadline::unbounded();
    let window_start = Utc::now() - Duration::hours(1);
    let window_end = Utc::now() + Duration::hours(1);
    let result = engine.compact("never-seen", window_start, window_end, deadline).await;
    assert!(result.is_err());
}
