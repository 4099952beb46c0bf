use noema_core::deadline::Deadline;
use noema_storage::StorageEngine;
use serde_json::{json, Map, Value};

fn store(engine: &StorageEngine, config: noema_core::config::GraphConfig) -> noema_graph::EntityStore {
    noema_graph::EntityStore::new(engine.pool().clone(), config)
}

fn extra(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn first_upsert_creates_with_default_confidence() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let store = store(&engine, Default::default());
    let deadline = Deadline::unbounded();

    let key = store
        .upsert_entity(
            "John".to_string(),
            "Person".to_string(),
            Some(vec![1.0, 0.0, 0.0]),
            Map::new(),
            deadline,
        )
        .await
        .unwrap();

    let entity = store.get(&key, deadline).await.unwrap().expect("entity exists");
    assert_eq!(entity.name, "John");
    assert_eq!(entity.entity_type, "Person");
    assert!((entity.confidence.value() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn second_upsert_blends_embedding_and_reinforces_confidence() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let store = store(&engine, Default::default());
    let deadline = Deadline::unbounded();

    store
        .upsert_entity(
            "TechCorp".to_string(),
            "Organization".to_string(),
            Some(vec![1.0, 0.0]),
            Map::new(),
            deadline,
        )
        .await
        .unwrap();

    let key = store
        .upsert_entity(
            "TechCorp".to_string(),
            "Organization".to_string(),
            Some(vec![0.0, 1.0]),
            extra(&[("nickname", json!("TC"))]),
            deadline,
        )
        .await
        .unwrap();

    let entity = store.get(&key, deadline).await.unwrap().expect("entity exists");
    // Reinforcement: 0.5 + 0.1*(1-0.5) = 0.55.
    assert!((entity.confidence.value() - 0.55).abs() < 1e-9);
    // Blended then L2-renormalized embedding of [1,0] and [0,1] is [~0.707, ~0.707].
    assert!((entity.embedding[0] - entity.embedding[1]).abs() < 1e-6);
    assert_eq!(entity.extra.get("nickname"), Some(&json!("TC")));
}

#[tokio::test]
async fn merge_extra_unions_list_fields_and_new_scalar_wins() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let store = store(&engine, Default::default());
    let deadline = Deadline::unbounded();

    let key = store
        .upsert_entity(
            "DataInc".to_string(),
            "Organization".to_string(),
            None,
            extra(&[("aliases", json!(["DI"])), ("size", json!("small"))]),
            deadline,
        )
        .await
        .unwrap();

    store
        .upsert_entity(
            "DataInc".to_string(),
            "Organization".to_string(),
            None,
            extra(&[("aliases", json!(["Data Incorporated"])), ("size", json!("large"))]),
            deadline,
        )
        .await
        .unwrap();

    let entity = store.get(&key, deadline).await.unwrap().expect("entity exists");
    assert_eq!(entity.extra.get("aliases"), Some(&json!(["DI", "Data Incorporated"])));
    assert_eq!(entity.extra.get("size"), Some(&json!("large")));
}

#[tokio::test]
async fn get_by_identity_finds_same_name_and_type() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let store = store(&engine, Default::default());
    let deadline = Deadline::unbounded();

    store
        .upsert_entity("Ada".to_string(), "Person".to_string(), None, Map::new(), deadline)
        .await
        .unwrap();

    let found = store.get_by_identity("Ada", "Person", deadline).await.unwrap();
    assert!(found.is_some());
    let missing = store.get_by_identity("Ada", "Organization", deadline).await.unwrap();
    assert!(missing.is_none());
}
