use noema_core::deadline::Deadline;
use noema_core::traits::{StorageAdapter, ViewFieldConfig};
use noema_storage::StorageEngine;
use serde_json::json;

fn fields() -> Vec<ViewFieldConfig> {
    vec![
        ViewFieldConfig {
            field: "content".to_string(),
            analyzer: "text_en".to_string(),
        },
        ViewFieldConfig {
            field: "summary".to_string(),
            analyzer: "text_en".to_string(),
        },
    ]
}

#[tokio::test]
async fn view_config_round_trips_and_matches_normalized_hash() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();
    engine
        .create_document("memories", json!({ "content": "python programming tutorial", "summary": "a tutorial" }), deadline)
        .await
        .unwrap();

    engine
        .create_view("memory_view", "memories", &fields(), deadline)
        .await
        .unwrap();

    let live = engine.view_config("memory_view", deadline).await.unwrap();
    assert!(live.is_some());
    assert_eq!(live.unwrap().len(), 2);
}

#[tokio::test]
async fn indexed_document_is_retrievable_via_bm25() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();
    engine
        .create_document(
            "memories",
            json!({ "content": "python programming tutorial", "summary": "learn python" }),
            deadline,
        )
        .await
        .unwrap();
    engine
        .create_document("memories", json!({ "content": "unrelated gardening notes", "summary": "plants" }), deadline)
        .await
        .unwrap();

    engine
        .create_view("memory_view", "memories", &fields(), deadline)
        .await
        .unwrap();

    let pool = engine.pool().clone();
    let hits = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| noema_storage::fts5::search_bm25(conn, "memory_view", "python", 10))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_collection, "memories");
}
