use super::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Bm25,
    Vector,
    ManualCosine,
    Tag,
    Keyword,
    GraphTraverse,
    Hybrid,
}

/// One hit produced by any search method, per §9's unified sum-type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc: Document,
    pub score: f64,
    pub engine: Engine,
    pub extras: HashMap<String, serde_json::Value>,
}

/// The shared result envelope every search method returns (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub time_ms: u64,
    pub engine: Engine,
    /// Set when a deadline elapsed mid-search and the result is partial.
    pub truncated: bool,
}

/// Stage-2 predicates applied after the unconstrained Stage-1 ANN query
/// (§4.7) or as a post-filter on BM25 tag intersection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub tag_list: Option<Vec<String>>,
    pub filter_expression: Option<String>,
    pub min_score: Option<f64>,
    /// Supplemented secondary filter (§11): substring/fuzzy match over a
    /// named field, applied after the mandatory predicates above.
    pub fuzzy: Option<FuzzyFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyFilter {
    pub field: String,
    pub query: String,
    pub min_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    Replace,
    Weighted,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPreset {
    TagBased,
    GraphExploration,
    Factual,
    Conceptual,
    RecentContext,
    Exploratory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMode {
    Intersection,
    Union,
}

/// View recreation policy (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPolicy {
    NeverRecreate,
    AlwaysRecreate,
    CheckConfig,
}

impl Default for ViewPolicy {
    fn default() -> Self {
        ViewPolicy::CheckConfig
    }
}
