use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::traits::{LlmClient, LlmParams};
use noema_graph::{EntityStore, RelationshipStore};
use noema_memory::{QaEdgeGenerator, QaPair};
use noema_storage::StorageEngine;
use std::sync::Arc;

struct FixedEntityExtractor;

impl LlmClient for FixedEntityExtractor {
    fn complete(&self, _prompt: &str, _params: &LlmParams) -> NoemaResult<String> {
        Ok(r#"[{"name":"Rust","entity_type":"language"},{"name":"Mozilla","entity_type":"organization"}]"#.to_string())
    }
}

#[tokio::test]
async fn generates_edges_between_every_ordered_entity_pair() {
    let storage = StorageEngine::open_in_memory().unwrap();
    let pool = storage.pool().clone();
    let entities = EntityStore::new(pool.clone(), Default::default());
    let relationships = RelationshipStore::new(pool.clone(), Default::default());
    let generator = QaEdgeGenerator::new(entities, relationships, Arc::new(FixedEntityExtractor));
    let deadline = Deadline::unbounded();

    let pair = QaPair {
        question: "Who created Rust?".to_string(),
        thinking: "The question asks about the origin of the Rust language.".to_string(),
        answer: "Rust was originally developed at Mozilla.".to_string(),
        question_type: "factual".to_string(),
        confidence: 0.9,
        validation_score: 0.8,
    };

    let result = generator.generate(&pair, deadline).await.unwrap();
    assert_eq!(result.entity_count, 2);
    assert_eq!(result.relationship_count, 2);
}

#[tokio::test]
async fn low_combined_confidence_still_creates_a_pending_edge() {
    let storage = StorageEngine::open_in_memory().unwrap();
    let pool = storage.pool().clone();
    let entities = EntityStore::new(pool.clone(), Default::default());
    let relationships = RelationshipStore::new(pool.clone(), Default::default());
    let generator = QaEdgeGenerator::new(entities, relationships, Arc::new(FixedEntityExtractor));
    let deadline = Deadline::unbounded();

    let pair = QaPair {
        question: "Who created Rust?".to_string(),
        thinking: "Low-confidence guess.".to_string(),
        answer: "Rust was originally developed at Mozilla.".to_string(),
        question_type: "factual".to_string(),
        confidence: 0.3,
        validation_score: 0.2,
    };

    let result = generator.generate(&pair, deadline).await.unwrap();
    assert_eq!(result.relationship_count, 2);
}
