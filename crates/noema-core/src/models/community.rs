use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cluster of entities, the output of a community-detection run (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub key: Option<String>,
    pub member_count: usize,
    pub modularity: f64,
    pub created_at: DateTime<Utc>,
}
