use chrono::{DateTime, Utc};
use noema_core::config::GraphConfig;
use noema_core::errors::StorageError;
use noema_core::models::{ContradictionAction, ContradictionLogEntry, ContradictionSummary, ResolutionPolicy};
use noema_storage::Pool;
use serde_json::Value;
use std::sync::Arc;

pub const RELATIONSHIP_COLLECTION: &str = "relationships";

/// A currently-valid edge pulled into the candidate set S (§4.6).
#[derive(Debug, Clone)]
pub struct ExistingEdge {
    pub key: String,
    pub to_key: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of running contradiction detection/resolution for a candidate
/// edge, before it is inserted.
pub enum ContradictionDecision {
    /// No functional-predicate conflict (or a non-functional predicate):
    /// proceed to insert E' with no further action.
    Clear,
    /// `newest_wins` / `highest_confidence_wins` resolved by invalidating
    /// the listed existing edges; proceed to insert E'.
    InvalidateAndInsert { invalidate: Vec<String> },
    /// `highest_confidence_wins` rejected E' because an existing edge has
    /// strictly higher confidence.
    Reject { reason: String },
    /// `manual` policy: insert E' as `pending`, leave S untouched, record
    /// cross-references.
    FlagManual { cross_references: Vec<String> },
}

/// Finds the set S of currently-valid edges sharing `(from, type)` with the
/// candidate. Free function so the caller can run it, `decide`, and the
/// eventual edge insert inside one write transaction without threading a
/// borrowed connection across an await boundary.
pub fn find_same_predicate_edges(
    conn: &rusqlite::Connection,
    from_key: &str,
    relationship_type: &str,
) -> Result<Vec<ExistingEdge>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT key, to_key, doc FROM edges \
             WHERE collection = ?1 AND from_key = ?2 AND edge_type = ?3 AND invalid_at IS NULL",
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    let rows = stmt
        .query_map(
            rusqlite::params![RELATIONSHIP_COLLECTION, from_key, relationship_type],
            |row| {
                let key: String = row.get(0)?;
                let to_key: String = row.get(1)?;
                let doc: String = row.get(2)?;
                Ok((key, to_key, doc))
            },
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    let mut out = Vec::new();
    for row in rows {
        let (key, to_key, doc) = row.map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
        let value: Value = serde_json::from_str(&doc).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
        let confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
        let created_at = value
            .get("temporal")
            .and_then(|t| t.get("created_at"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        out.push(ExistingEdge {
            key,
            to_key,
            confidence,
            created_at,
        });
    }
    Ok(out)
}

/// Applies §4.6 detection + resolution for candidate edge E'
/// `(relationship_type, candidate_to, candidate_confidence)` against the
/// set S already fetched by [`find_same_predicate_edges`].
pub fn decide(
    config: &GraphConfig,
    relationship_type: &str,
    candidate_to: &str,
    candidate_confidence: f64,
    same_predicate: &[ExistingEdge],
    policy: ResolutionPolicy,
) -> ContradictionDecision {
    if !config.is_functional(relationship_type) {
        return ContradictionDecision::Clear;
    }
    let conflicting: Vec<&ExistingEdge> = same_predicate.iter().filter(|e| e.to_key != candidate_to).collect();
    if conflicting.is_empty() {
        return ContradictionDecision::Clear;
    }
    match policy {
        ResolutionPolicy::NewestWins => ContradictionDecision::InvalidateAndInsert {
            invalidate: conflicting.into_iter().map(|e| e.key.clone()).collect(),
        },
        ResolutionPolicy::HighestConfidenceWins => {
            let max_existing = conflicting
                .iter()
                .max_by(|a, b| {
                    a.confidence
                        .partial_cmp(&b.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| tie_break(a, b))
                })
                .expect("conflicting is non-empty");
            if max_existing.confidence > candidate_confidence {
                ContradictionDecision::Reject {
                    reason: format!(
                        "existing edge {} has confidence {:.3} > candidate {:.3}",
                        max_existing.key, max_existing.confidence, candidate_confidence
                    ),
                }
            } else {
                ContradictionDecision::InvalidateAndInsert {
                    invalidate: conflicting.into_iter().map(|e| e.key.clone()).collect(),
                }
            }
        }
        ResolutionPolicy::Manual => ContradictionDecision::FlagManual {
            cross_references: conflicting.into_iter().map(|e| e.key.clone()).collect(),
        },
    }
}

/// Writes one contradiction-log entry for a (new, existing) pair that
/// entered detection (P8: completeness). Runs inside the same write
/// transaction as the edge commit.
#[allow(clippy::too_many_arguments)]
pub fn log_entry(
    conn: &rusqlite::Connection,
    new_edge: &str,
    existing_edge: &str,
    strategy: ResolutionPolicy,
    action: ContradictionAction,
    success: bool,
    reason: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO contradiction_log (new_edge, existing_edge, strategy, action, success, reason, timestamp, context) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '{}')",
        rusqlite::params![
            new_edge,
            existing_edge,
            serde_json::to_string(&strategy).unwrap_or_default(),
            serde_json::to_string(&action).unwrap_or_default(),
            success as i64,
            reason,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

fn tie_break(a: &ExistingEdge, b: &ExistingEdge) -> std::cmp::Ordering {
    // Smaller created_at wins; equal timestamps break lexicographically by key.
    b.created_at.cmp(&a.created_at).then_with(|| b.key.cmp(&a.key))
}

/// Thin handle over the contradiction log for the read-only `summary()`
/// query (§4.6: "C6 exposes `summary()`").
pub struct ContradictionEngine {
    pool: Arc<Pool>,
}

impl ContradictionEngine {
    pub fn new(pool: Arc<Pool>) -> Self {
        ContradictionEngine { pool }
    }

    pub async fn summary(&self) -> Result<ContradictionSummary, StorageError> {
        let pool = self.pool.clone();
        let entries = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT new_edge, existing_edge, strategy, action, success, reason, timestamp, context \
                         FROM contradiction_log",
                    )
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                        ))
                    })
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                let mut entries = Vec::new();
                for row in rows {
                    let (new_edge, existing_edge, strategy, action, success, reason, timestamp, context) =
                        row.map_err(|e| StorageError::SqliteError {
                            message: e.to_string(),
                        })?;
                    entries.push(ContradictionLogEntry {
                        new_edge,
                        existing_edge,
                        strategy: serde_json::from_str(&strategy).unwrap_or_default(),
                        action: serde_json::from_str(&action).unwrap_or(ContradictionAction::Reject),
                        success: success != 0,
                        reason,
                        timestamp: DateTime::parse_from_rfc3339(&timestamp)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                        context: serde_json::from_str(&context).unwrap_or_default(),
                    });
                }
                Ok(entries)
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(ContradictionSummary::from_entries(&entries))
    }
}
