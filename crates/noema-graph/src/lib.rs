//! Entity/relationship storage (C5), contradiction detection and
//! resolution (C6), and Louvain-style community detection (C11).

pub mod community;
pub mod contradiction;
pub mod entity_store;
pub mod relationship_store;

pub use community::CommunityDetector;
pub use contradiction::ContradictionEngine;
pub use entity_store::EntityStore;
pub use relationship_store::{CreateRelationshipOutcome, RelationshipStore};
