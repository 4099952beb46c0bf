use noema_core::deadline::Deadline;
use noema_core::traits::{IndexMetric, StorageAdapter};
use noema_storage::StorageEngine;
use serde_json::json;

#[tokio::test]
async fn round_trip_preserves_fields_except_key() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();

    let doc = json!({ "content": "hello", "summary": "hi", "conversation_id": "c1" });
    let key = engine
        .create_document("memories", doc.clone(), deadline)
        .await
        .expect("create");

    let fetched = engine
        .get_document("memories", &key, deadline)
        .await
        .expect("get")
        .expect("present");

    assert_eq!(fetched["content"], "hello");
    assert_eq!(fetched["summary"], "hi");
    assert_eq!(fetched["key"], key);
}

#[tokio::test]
async fn edge_documents_round_trip_from_to() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_edge_collection("relationships", deadline).await.unwrap();

    let doc = json!({
        "from": "entities/john",
        "to": "entities/techcorp",
        "relationship_type": "WORKS_FOR",
        "rationale": "John has stated in conversation that he is employed at TechCorp as an engineer.",
    });
    let key = engine
        .create_document("relationships", doc, deadline)
        .await
        .expect("create");

    let fetched = engine
        .get_document("relationships", &key, deadline)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(fetched["from"], "entities/john");
    assert_eq!(fetched["to"], "entities/techcorp");
}

#[tokio::test]
async fn update_merges_patch_into_existing_document() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("episodes", deadline).await.unwrap();

    let key = engine
        .create_document("episodes", json!({ "title": "launch", "is_active": true }), deadline)
        .await
        .unwrap();

    engine
        .update_document("episodes", &key, json!({ "is_active": false }), deadline)
        .await
        .unwrap();

    let fetched = engine.get_document("episodes", &key, deadline).await.unwrap().unwrap();
    assert_eq!(fetched["title"], "launch");
    assert_eq!(fetched["is_active"], false);
}

#[tokio::test]
async fn delete_removes_document() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("entities", deadline).await.unwrap();

    let key = engine
        .create_document("entities", json!({ "name": "John", "entity_type": "Person" }), deadline)
        .await
        .unwrap();
    engine.delete_document("entities", &key, deadline).await.unwrap();
    assert!(engine.get_document("entities", &key, deadline).await.unwrap().is_none());
}

#[tokio::test]
async fn ensure_vector_index_is_idempotent_no_op() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine
        .ensure_vector_index("memories", "embedding", 1024, IndexMetric::Cosine, 2, deadline)
        .await
        .unwrap();
    engine
        .ensure_vector_index("memories", "embedding", 1024, IndexMetric::Cosine, 2, deadline)
        .await
        .unwrap();
}
