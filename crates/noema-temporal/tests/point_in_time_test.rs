use chrono::{TimeZone, Utc};
use noema_core::deadline::Deadline;
use noema_core::traits::StorageAdapter;
use noema_storage::StorageEngine;
use noema_temporal::{CollectionKind, TemporalEngine};
use serde_json::json;

fn ts(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn invalidate_and_point_in_time_round_trip() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();

    let key = engine
        .create_document(
            "memories",
            json!({
                "content": "first draft",
                "temporal": {
                    "created_at": ts(2024, 1, 1).to_rfc3339(),
                    "valid_at": ts(2024, 1, 1).to_rfc3339(),
                    "invalid_at": null,
                }
            }),
            deadline,
        )
        .await
        .unwrap();

    let temporal = TemporalEngine::new(engine.pool().clone());

    let before = temporal
        .point_in_time("memories", CollectionKind::Vertex, ts(2024, 6, 1), deadline)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);

    temporal
        .invalidate(
            "memories",
            CollectionKind::Vertex,
            &key,
            ts(2024, 7, 1),
            "compaction".to_string(),
            "test".to_string(),
            None,
            deadline,
        )
        .await
        .unwrap();

    let still_valid_before_cutoff = temporal
        .point_in_time("memories", CollectionKind::Vertex, ts(2024, 6, 1), deadline)
        .await
        .unwrap();
    assert_eq!(still_valid_before_cutoff.len(), 1);

    let invalid_after_cutoff = temporal
        .point_in_time("memories", CollectionKind::Vertex, ts(2024, 8, 1), deadline)
        .await
        .unwrap();
    assert_eq!(invalid_after_cutoff.len(), 0);
}

#[tokio::test]
async fn double_invalidation_with_later_t_end_is_noop() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();
    let key = engine
        .create_document("memories", json!({ "content": "x" }), deadline)
        .await
        .unwrap();

    let temporal = TemporalEngine::new(engine.pool().clone());
    temporal
        .invalidate(
            "memories",
            CollectionKind::Vertex,
            &key,
            ts(2024, 7, 1),
            "c".to_string(),
            "a".to_string(),
            None,
            deadline,
        )
        .await
        .unwrap();

    // t_end >= existing invalid_at: no-op, not an error.
    temporal
        .invalidate(
            "memories",
            CollectionKind::Vertex,
            &key,
            ts(2024, 7, 2),
            "c".to_string(),
            "a".to_string(),
            None,
            deadline,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn invalidation_with_earlier_t_end_is_invariant_violation() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let deadline = Deadline::unbounded();
    engine.ensure_collection("memories", deadline).await.unwrap();
    let key = engine
        .create_document("memories", json!({ "content": "x" }), deadline)
        .await
        .unwrap();

    let temporal = TemporalEngine::new(engine.pool().clone());
    temporal
        .invalidate(
            "memories",
            CollectionKind::Vertex,
            &key,
            ts(2024, 7, 1),
            "c".to_string(),
            "a".to_string(),
            None,
            deadline,
        )
        .await
        .unwrap();

    let result = temporal
        .invalidate(
            "memories",
            CollectionKind::Vertex,
            &key,
            ts(2024, 1, 1),
            "c".to_string(),
            "a".to_string(),
            None,
            deadline,
        )
        .await;
    assert!(matches!(result, Err(noema_core::errors::NoemaError::InvariantViolation(_))));
}
