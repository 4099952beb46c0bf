use chrono::Utc;
use noema_core::deadline::Deadline;
use noema_core::models::{Document, FilterPredicate};
use noema_core::traits::StorageAdapter;
use noema_search::SearchEngine;
use noema_storage::StorageEngine as Engine;
use serde_json::json;

fn memory_doc(content: &str, embedding: [f32; 2], tags: &[&str]) -> serde_json::Value {
    let now = Utc::now().to_rfc3339();
    json!({
        "key": null,
        "content": content,
        "summary": content,
        "embedding": embedding,
        "conversation_id": "c1",
        "metadata": {"tags": tags},
        "temporal": {"created_at": now, "valid_at": now, "invalid_at": null},
    })
}

/// Scenario 4 (§8): 50 documents, 5 tagged "ai", query for "artificial
/// intelligence" with `tag_list=["ai"]`, `top_n=3`, `expand_factor=5`.
/// Stage 1 fetches 15 candidates with no tag filter; Stage 2 returns at
/// most 3, all carrying "ai".
#[tokio::test]
async fn two_stage_vector_search_filters_after_the_unconstrained_ann_stage() {
    let storage = Engine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();

    for i in 0..5 {
        storage
            .create_document("memories", memory_doc(&format!("ai doc {i}"), [1.0, 0.0], &["ai"]), deadline)
            .await
            .unwrap();
    }
    for i in 0..45 {
        storage
            .create_document("memories", memory_doc(&format!("unrelated doc {i}"), [0.0, 1.0], &[]), deadline)
            .await
            .unwrap();
    }

    let search = SearchEngine::new(storage.pool().clone(), Default::default());
    let filter = FilterPredicate { tag_list: Some(vec!["ai".to_string()]), ..Default::default() };
    let envelope = search.vector(vec![1.0, 0.0], filter, 3, deadline).await.unwrap();

    assert_eq!(envelope.total, 3);
    assert!(envelope.results.len() <= 3);
    for hit in &envelope.results {
        match &hit.doc {
            Document::Memory(m) => {
                let tags = m.metadata.get("tags").and_then(|v| v.as_array()).cloned().unwrap_or_default();
                assert!(tags.iter().any(|t| t.as_str() == Some("ai")));
            }
            other => panic!("unexpected doc kind in vector results: {other:?}"),
        }
    }
}
