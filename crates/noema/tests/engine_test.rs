use noema::Engine;
use noema_core::config::NoemaConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::traits::{Embedder, LlmClient, LlmParams};
use serde_json::Map;
use std::sync::Arc;

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> NoemaResult<Vec<f32>> {
        let mut v = vec![0.0_f32; 1024];
        v[0] = text.len() as f32 + 1.0;
        Ok(v)
    }

    fn model_id(&self) -> &str {
        "stub-embedder"
    }
}

struct StubLlm;

impl LlmClient for StubLlm {
    fn complete(&self, prompt: &str, _params: &LlmParams) -> NoemaResult<String> {
        if prompt.contains("relation") {
            Ok("[]".to_string())
        } else {
            Ok("[]".to_string())
        }
    }
}

fn config() -> NoemaConfig {
    let mut config = NoemaConfig::default();
    config.storage.database_path = ":memory:".to_string();
    config.embedding.dimension = 1024;
    config
}

#[tokio::test]
async fn ingests_a_turn_and_finds_it_by_search() {
    let engine = Engine::init(config(), Arc::new(StubEmbedder), Some(Arc::new(StubLlm))).unwrap();
    let deadline = Deadline::unbounded();

    let result = engine
        .store_conversation(
            noema_memory::StoreConversationParams {
                user_msg: "What language is this engine written in?".to_string(),
                agent_msg: "Rust.".to_string(),
                conversation_id: None,
                episode_id: None,
                metadata: Map::new(),
                reference_time: None,
            },
            deadline,
        )
        .await
        .unwrap();

    assert!(!result.conversation_id.is_empty());

    let embedding = StubEmbedder.embed("What language is this engine written in?").unwrap();
    let hits = engine
        .search("What language is this engine written in?", embedding, Some(&result.conversation_id), 5, None, deadline)
        .await
        .unwrap();
    assert!(!hits.results.is_empty());
}

#[tokio::test]
async fn episode_lifecycle_round_trips() {
    let engine = Engine::init(config(), Arc::new(StubEmbedder), None).unwrap();
    let deadline = Deadline::unbounded();

    let key = engine.open_episode("planning a trip".to_string(), "session".to_string(), deadline).await.unwrap();
    let current = engine.current_episode(deadline).await.unwrap().expect("an active episode");
    assert_eq!(current.key, Some(key.clone()));

    let outcome = engine.close_episode(&key, deadline).await.unwrap();
    assert_eq!(outcome, noema_core::models::CloseOutcome::Closed);
    assert!(engine.current_episode(deadline).await.unwrap().is_none());
}

#[tokio::test]
async fn compaction_is_unavailable_without_an_llm() {
    let engine = Engine::init(config(), Arc::new(StubEmbedder), None).unwrap();
    let deadline = Deadline::unbounded();
    let now = chrono::Utc::now();
    let result = engine.compact("conv-1", now - chrono::Duration::hours(1), now, deadline).await;
    assert!(result.is_err());
}
