use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    NewestWins,
    HighestConfidenceWins,
    Manual,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        ResolutionPolicy::NewestWins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionAction {
    Invalidate,
    Reject,
    FlagManual,
}

/// One record per (new, existing) edge pair that entered contradiction
/// detection, regardless of outcome (P8: contradiction log completeness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionLogEntry {
    pub new_edge: String,
    pub existing_edge: String,
    pub strategy: ResolutionPolicy,
    pub action: ContradictionAction,
    pub success: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub context: HashMap<String, serde_json::Value>,
}

/// Aggregate view over the contradiction log, field names pinned to the
/// original implementation's `get_contradiction_summary()` shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContradictionSummary {
    pub total: usize,
    pub resolved: usize,
    pub success_rate: f64,
}

impl ContradictionSummary {
    pub fn from_entries(entries: &[ContradictionLogEntry]) -> Self {
        let total = entries.len();
        let resolved = entries.iter().filter(|e| e.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            resolved as f64 / total as f64
        };
        ContradictionSummary {
            total,
            resolved,
            success_rate,
        }
    }
}
