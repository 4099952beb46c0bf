use super::confidence::Confidence;
use super::temporal::TemporalStamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    AutoApproved,
    Pending,
    Rejected,
}

/// Minimum rationale length enforced by I6 and validated by
/// `create_relationship` (§4.5).
pub const MIN_RATIONALE_LEN: usize = 50;

/// Confidence floor below which a new edge is forced to `pending` review,
/// regardless of endpoint confidences (I6).
pub const AUTO_APPROVE_CONFIDENCE_FLOOR: f64 = 0.7;

/// A typed, directed connection between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub key: Option<String>,
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub rationale: String,
    pub confidence: Confidence,
    pub weight: f64,
    pub temporal: TemporalStamp,
    pub invalidated_by: Option<String>,
    pub review_status: ReviewStatus,
}

/// Fixed base-weight table keyed by relationship-type category, used to
/// compute `weight = base_weight(type) * confidence` (§4.5). Categories are
/// matched case-insensitively against the relationship's type string; an
/// unrecognized type falls back to the default weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightCategory {
    Factual,
    Causal,
    MultiHop,
    Associative,
}

impl WeightCategory {
    pub fn base_weight(self) -> f64 {
        match self {
            WeightCategory::Factual => 1.0,
            WeightCategory::Causal => 0.9,
            WeightCategory::MultiHop => 0.6,
            WeightCategory::Associative => 0.5,
        }
    }
}

/// Default base weight for relationship-type categories not present in the
/// category table.
pub const DEFAULT_BASE_WEIGHT: f64 = 0.7;

pub fn base_weight_for_category(category: Option<WeightCategory>) -> f64 {
    category.map(WeightCategory::base_weight).unwrap_or(DEFAULT_BASE_WEIGHT)
}
