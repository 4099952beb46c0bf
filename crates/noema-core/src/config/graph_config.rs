use crate::models::ResolutionPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// The functional-predicate set is configuration, never hard-coded
    /// (§4.6): relationship types for which a subject has at most one
    /// currently-valid object.
    pub functional_predicates: Vec<String>,
    pub default_resolution_policy: ResolutionPolicy,
    /// Minimum community size before small-cluster merging folds it into a
    /// neighbor (§4.11).
    pub community_min_size: usize,
    /// Reinforcement step for repeated entity upserts (§4.5, alpha=0.1).
    pub confidence_reinforce_alpha: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            functional_predicates: vec![
                "WORKS_FOR".to_string(),
                "LIVES_IN".to_string(),
                "OWNS".to_string(),
            ],
            default_resolution_policy: ResolutionPolicy::NewestWins,
            community_min_size: 2,
            confidence_reinforce_alpha: 0.1,
        }
    }
}

impl GraphConfig {
    pub fn is_functional(&self, relationship_type: &str) -> bool {
        self.functional_predicates
            .iter()
            .any(|p| p.eq_ignore_ascii_case(relationship_type))
    }
}
