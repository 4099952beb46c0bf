use crate::models::{RerankStrategy, ViewPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates fetched per method before fusion/filtering (§4.7).
    pub initial_k: usize,
    pub top_n: usize,
    /// Stage-1 overfetch multiplier for the two-stage vector pattern.
    pub expand_factor: usize,
    pub min_score_default: f64,
    /// RRF constant k0 (§4.7, default 60).
    pub rrf_k0: f64,
    pub rerank_strategy: RerankStrategy,
    pub rerank_top_k: usize,
    /// Linear-mix weight used only when `rerank_strategy = weighted`.
    pub rerank_weight: f64,
    pub view_policy: ViewPolicy,
    /// Window applied to `valid_at` for the RECENT_CONTEXT preset (§4.8).
    pub recent_context_window_days: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            initial_k: 50,
            top_n: 10,
            expand_factor: 5,
            min_score_default: 0.0,
            rrf_k0: 60.0,
            rerank_strategy: RerankStrategy::Weighted,
            rerank_top_k: 20,
            rerank_weight: 0.5,
            view_policy: ViewPolicy::CheckConfig,
            recent_context_window_days: 7,
        }
    }
}
