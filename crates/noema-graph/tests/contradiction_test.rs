use noema_core::config::GraphConfig;
use noema_core::deadline::Deadline;
use noema_core::models::ResolutionPolicy;
use noema_graph::{ContradictionEngine, CreateRelationshipOutcome, EntityStore, RelationshipStore};
use noema_storage::StorageEngine;
use serde_json::Map;
use std::collections::HashMap;

const RATIONALE: &str = "John mentioned his employer during the conversation about career plans.";

async fn seed_person_and_two_orgs(entities: &EntityStore, deadline: Deadline) -> (String, String, String) {
    let john = entities
        .upsert_entity("John".to_string(), "Person".to_string(), None, Map::new(), deadline)
        .await
        .unwrap();
    let techcorp = entities
        .upsert_entity("TechCorp".to_string(), "Organization".to_string(), None, Map::new(), deadline)
        .await
        .unwrap();
    let datainc = entities
        .upsert_entity("DataInc".to_string(), "Organization".to_string(), None, Map::new(), deadline)
        .await
        .unwrap();
    (john, techcorp, datainc)
}

#[tokio::test]
async fn newest_wins_invalidates_prior_functional_edge() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let config = GraphConfig::default();
    let entities = EntityStore::new(engine.pool().clone(), config.clone());
    let relationships = RelationshipStore::new(engine.pool().clone(), config.clone());
    let deadline = Deadline::unbounded();

    let (john, techcorp, datainc) = seed_person_and_two_orgs(&entities, deadline).await;

    let first = relationships
        .create_relationship(
            john.clone(),
            techcorp,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.9,
            None,
            Some(ResolutionPolicy::NewestWins),
            deadline,
        )
        .await
        .unwrap();
    let first_key = match first {
        CreateRelationshipOutcome::Created(key) => key,
        CreateRelationshipOutcome::Rejected { reason } => panic!("unexpected rejection: {reason}"),
    };

    let second = relationships
        .create_relationship(
            john,
            datainc,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.95,
            None,
            Some(ResolutionPolicy::NewestWins),
            deadline,
        )
        .await
        .unwrap();
    assert!(matches!(second, CreateRelationshipOutcome::Created(_)));

    let pool = engine.pool().clone();
    let first_invalid_at: Option<String> = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| {
            conn.query_row(
                "SELECT invalid_at FROM edges WHERE collection = 'relationships' AND key = ?1",
                rusqlite::params![first_key],
                |row| row.get(0),
            )
            .map_err(|e| noema_core::errors::StorageError::SqliteError { message: e.to_string() })
        })
    })
    .await
    .unwrap()
    .unwrap();
    assert!(first_invalid_at.is_some());

    let summary = ContradictionEngine::new(engine.pool().clone()).summary().await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.resolved, 1);
}

#[tokio::test]
async fn highest_confidence_wins_rejects_weaker_candidate() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let config = GraphConfig::default();
    let entities = EntityStore::new(engine.pool().clone(), config.clone());
    let relationships = RelationshipStore::new(engine.pool().clone(), config.clone());
    let deadline = Deadline::unbounded();

    let (john, techcorp, datainc) = seed_person_and_two_orgs(&entities, deadline).await;

    relationships
        .create_relationship(
            john.clone(),
            techcorp,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.95,
            None,
            Some(ResolutionPolicy::HighestConfidenceWins),
            deadline,
        )
        .await
        .unwrap();

    let second = relationships
        .create_relationship(
            john,
            datainc,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.5,
            None,
            Some(ResolutionPolicy::HighestConfidenceWins),
            deadline,
        )
        .await
        .unwrap();

    assert!(matches!(second, CreateRelationshipOutcome::Rejected { .. }));
}

#[tokio::test]
async fn manual_policy_flags_pending_and_leaves_existing_edge_untouched() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let config = GraphConfig::default();
    let entities = EntityStore::new(engine.pool().clone(), config.clone());
    let relationships = RelationshipStore::new(engine.pool().clone(), config.clone());
    let deadline = Deadline::unbounded();

    let (john, techcorp, datainc) = seed_person_and_two_orgs(&entities, deadline).await;

    let first = relationships
        .create_relationship(
            john.clone(),
            techcorp,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.9,
            None,
            Some(ResolutionPolicy::Manual),
            deadline,
        )
        .await
        .unwrap();
    let first_key = match first {
        CreateRelationshipOutcome::Created(key) => key,
        CreateRelationshipOutcome::Rejected { reason } => panic!("unexpected rejection: {reason}"),
    };

    relationships
        .create_relationship(
            john,
            datainc,
            "WORKS_FOR".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            0.9,
            None,
            Some(ResolutionPolicy::Manual),
            deadline,
        )
        .await
        .unwrap();

    let pool = engine.pool().clone();
    let first_invalid_at: Option<String> = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| {
            conn.query_row(
                "SELECT invalid_at FROM edges WHERE collection = 'relationships' AND key = ?1",
                rusqlite::params![first_key],
                |row| row.get(0),
            )
            .map_err(|e| noema_core::errors::StorageError::SqliteError { message: e.to_string() })
        })
    })
    .await
    .unwrap()
    .unwrap();
    assert!(first_invalid_at.is_none(), "manual policy must not invalidate S");
}

#[tokio::test]
async fn rationale_below_minimum_length_is_rejected() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let config = GraphConfig::default();
    let entities = EntityStore::new(engine.pool().clone(), config.clone());
    let relationships = RelationshipStore::new(engine.pool().clone(), config.clone());
    let deadline = Deadline::unbounded();

    let (john, techcorp, _datainc) = seed_person_and_two_orgs(&entities, deadline).await;

    let result = relationships
        .create_relationship(
            john,
            techcorp,
            "WORKS_FOR".to_string(),
            "too short".to_string(),
            HashMap::new(),
            0.9,
            None,
            None,
            deadline,
        )
        .await;
    assert!(matches!(result, Err(noema_core::errors::NoemaError::ValidationFailed(_))));
}
