use chrono::Utc;
use noema_core::deadline::Deadline;
use noema_core::traits::StorageAdapter;
use noema_search::SearchEngine;
use noema_storage::StorageEngine as Engine;
use serde_json::json;

fn memory_doc(content: &str, embedding: [f32; 2]) -> serde_json::Value {
    let now = Utc::now().to_rfc3339();
    json!({
        "key": null,
        "content": content,
        "summary": content,
        "embedding": embedding,
        "conversation_id": "c1",
        "metadata": {},
        "temporal": {"created_at": now, "valid_at": now, "invalid_at": null},
    })
}

/// Scenario 6 (§8): routing a FACTUAL query ends up fetching via BM25.
#[tokio::test]
async fn factual_query_routes_through_bm25() {
    let storage = Engine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    storage
        .create_document("memories", memory_doc("Python is a general-purpose programming language", [1.0, 0.0]), deadline)
        .await
        .unwrap();

    let search = SearchEngine::new(storage.pool().clone(), Default::default());
    search.ensure_views().await.unwrap();

    let envelope = search.route("What is Python?", vec![1.0, 0.0], None, None, 5, deadline).await.unwrap();
    assert!(envelope.total >= 1);
}
