use noema_core::config::GraphConfig;
use noema_core::deadline::Deadline;
use noema_core::models::ResolutionPolicy;
use noema_graph::{CommunityDetector, CreateRelationshipOutcome, EntityStore, RelationshipStore};
use noema_storage::StorageEngine;
use serde_json::Map;
use std::collections::HashMap;

const RATIONALE: &str = "These two entities co-occurred repeatedly across the observed conversation history.";

async fn link(store: &RelationshipStore, a: &str, b: &str) {
    let outcome = store
        .create_relationship(
            a.to_string(),
            b.to_string(),
            "ASSOCIATIVE".to_string(),
            RATIONALE.to_string(),
            HashMap::new(),
            1.0,
            None,
            Some(ResolutionPolicy::NewestWins),
            Deadline::unbounded(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, CreateRelationshipOutcome::Created(_)));
}

/// Scenario 5 (§8): K4 {A,B,C,D} fully connected, isolated pair {E,F}
/// connected to each other, no cross edges. Expect two communities with
/// positive modularity.
#[tokio::test]
async fn k4_plus_isolated_pair_yields_two_communities() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let mut config = GraphConfig::default();
    config.community_min_size = 2;
    let entities = EntityStore::new(engine.pool().clone(), config.clone());
    let relationships = RelationshipStore::new(engine.pool().clone(), config.clone());
    let detector = CommunityDetector::new(engine.pool().clone(), config);
    let deadline = Deadline::unbounded();

    let mut keys = HashMap::new();
    for name in ["A", "B", "C", "D", "E", "F"] {
        let key = entities
            .upsert_entity(name.to_string(), "Concept".to_string(), None, Map::new(), deadline)
            .await
            .unwrap();
        keys.insert(name, key);
    }

    for (a, b) in [("A", "B"), ("A", "C"), ("A", "D"), ("B", "C"), ("B", "D"), ("C", "D")] {
        link(&relationships, &keys[a], &keys[b]).await;
    }
    link(&relationships, &keys["E"], &keys["F"]).await;

    let communities = detector.detect_and_persist(deadline).await.unwrap();

    assert_eq!(communities.len(), 2, "expected K4 and the isolated pair to form two communities");
    let mut sizes: Vec<usize> = communities.iter().map(|c| c.member_count).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 4]);
    assert!(communities[0].modularity > 0.0);

    let a_entity = entities.get(&keys["A"], deadline).await.unwrap().expect("A exists");
    let e_entity = entities.get(&keys["E"], deadline).await.unwrap().expect("E exists");
    assert!(a_entity.community_id.is_some());
    assert!(e_entity.community_id.is_some());
    assert_ne!(a_entity.community_id, e_entity.community_id);
}

#[tokio::test]
async fn empty_graph_returns_no_communities() {
    let engine = StorageEngine::open_in_memory().expect("open");
    let config = GraphConfig::default();
    let detector = CommunityDetector::new(engine.pool().clone(), config);
    let communities = detector.detect_and_persist(Deadline::unbounded()).await.unwrap();
    assert!(communities.is_empty());
}
