use chrono::{DateTime, Utc};
use noema_core::config::GraphConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult, StorageError};
use noema_core::models::{
    base_weight_for_category, Confidence, ContradictionAction, Relationship, ResolutionPolicy, ReviewStatus,
    TemporalStamp, WeightCategory, AUTO_APPROVE_CONFIDENCE_FLOOR, MIN_RATIONALE_LEN,
};
use noema_storage::Pool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::contradiction::{self, ContradictionDecision};

const RELATIONSHIP_COLLECTION: &str = "relationships";
const ENTITY_COLLECTION: &str = "entities";

/// Maps a free-form relationship type string onto the fixed base-weight
/// category table (§4.5). Unrecognized types fall through to the default
/// weight via [`base_weight_for_category`].
fn category_for_type(relationship_type: &str) -> Option<WeightCategory> {
    match relationship_type.to_ascii_uppercase().as_str() {
        "FACTUAL" => Some(WeightCategory::Factual),
        "CAUSAL" => Some(WeightCategory::Causal),
        "MULTI_HOP" => Some(WeightCategory::MultiHop),
        "ASSOCIATIVE" => Some(WeightCategory::Associative),
        _ => None,
    }
}

/// Result of [`RelationshipStore::create_relationship`]: either the
/// committed edge key, or a rejection surfaced by the contradiction engine's
/// `highest_confidence_wins` policy.
#[derive(Debug, Clone)]
pub enum CreateRelationshipOutcome {
    Created(String),
    Rejected { reason: String },
}

pub struct RelationshipStore {
    pool: Arc<Pool>,
    config: GraphConfig,
}

impl RelationshipStore {
    pub fn new(pool: Arc<Pool>, config: GraphConfig) -> Self {
        RelationshipStore { pool, config }
    }

    /// §4.5 `create_relationship`: validates, computes weight, runs the
    /// candidate through §4.6 contradiction detection/resolution, assigns
    /// review status, and emits the edge — all inside one write transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_relationship(
        &self,
        from: String,
        to: String,
        relationship_type: String,
        rationale: String,
        attributes: HashMap<String, Value>,
        confidence: f64,
        valid_at: Option<DateTime<Utc>>,
        policy: Option<ResolutionPolicy>,
        deadline: Deadline,
    ) -> NoemaResult<CreateRelationshipOutcome> {
        deadline.check()?;
        if rationale.chars().count() < MIN_RATIONALE_LEN {
            return Err(NoemaError::ValidationFailed(format!(
                "rationale must be at least {MIN_RATIONALE_LEN} characters"
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(NoemaError::ValidationFailed("confidence must be within [0, 1]".to_string()));
        }

        let policy = policy.unwrap_or(self.config.default_resolution_policy);
        let config = self.config.clone();
        let pool = self.pool.clone();
        let now = valid_at.unwrap_or_else(Utc::now);

        let outcome = tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                let from_confidence = entity_confidence(conn, &from)?
                    .ok_or_else(|| StorageError::DocumentNotFound { id: from.clone() })?;
                let to_confidence =
                    entity_confidence(conn, &to)?.ok_or_else(|| StorageError::DocumentNotFound { id: to.clone() })?;

                let weight = base_weight_for_category(category_for_type(&relationship_type)) * confidence;
                let review_status = if confidence >= AUTO_APPROVE_CONFIDENCE_FLOOR
                    && from_confidence >= AUTO_APPROVE_CONFIDENCE_FLOOR
                    && to_confidence >= AUTO_APPROVE_CONFIDENCE_FLOOR
                {
                    ReviewStatus::AutoApproved
                } else {
                    ReviewStatus::Pending
                };

                let same_predicate = contradiction::find_same_predicate_edges(conn, &from, &relationship_type)?;
                let decision = contradiction::decide(&config, &relationship_type, &to, confidence, &same_predicate, policy);

                let new_key = uuid::Uuid::new_v4().to_string();
                let relationship = Relationship {
                    key: Some(new_key.clone()),
                    from: from.clone(),
                    to: to.clone(),
                    relationship_type: relationship_type.clone(),
                    attributes,
                    rationale,
                    confidence: Confidence::new(confidence),
                    weight,
                    temporal: TemporalStamp::new(now, None),
                    invalidated_by: None,
                    review_status,
                };

                commit_decision(conn, relationship, decision, policy, now)
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))?
        .map_err(NoemaError::from)?;

        Ok(outcome)
    }
}

fn entity_confidence(conn: &rusqlite::Connection, key: &str) -> Result<Option<f64>, StorageError> {
    conn.query_row(
        "SELECT json_extract(doc, '$.confidence') FROM documents WHERE collection = ?1 AND key = ?2",
        rusqlite::params![ENTITY_COLLECTION, key],
        |row| row.get::<_, f64>(0),
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError {
            message: other.to_string(),
        }),
    })
}

fn commit_decision(
    conn: &rusqlite::Connection,
    mut relationship: Relationship,
    decision: ContradictionDecision,
    policy: ResolutionPolicy,
    now: DateTime<Utc>,
) -> Result<CreateRelationshipOutcome, StorageError> {
    let new_key = relationship.key.clone().unwrap_or_default();
    match decision {
        ContradictionDecision::Clear => {
            insert_edge(conn, &relationship)?;
            Ok(CreateRelationshipOutcome::Created(new_key))
        }
        ContradictionDecision::InvalidateAndInsert { invalidate } => {
            for existing_key in &invalidate {
                invalidate_edge(conn, existing_key, now, &new_key)?;
                contradiction::log_entry(
                    conn,
                    &new_key,
                    existing_key,
                    policy,
                    ContradictionAction::Invalidate,
                    true,
                    "superseded by newer edge on the same functional predicate",
                )?;
            }
            insert_edge(conn, &relationship)?;
            Ok(CreateRelationshipOutcome::Created(new_key))
        }
        ContradictionDecision::Reject { reason } => {
            contradiction::log_entry(
                conn,
                &new_key,
                &relationship.to,
                policy,
                ContradictionAction::Reject,
                false,
                &reason,
            )?;
            Ok(CreateRelationshipOutcome::Rejected { reason })
        }
        ContradictionDecision::FlagManual { cross_references } => {
            relationship.review_status = ReviewStatus::Pending;
            relationship.attributes.insert(
                "cross_references".to_string(),
                Value::Array(cross_references.iter().cloned().map(Value::String).collect()),
            );
            insert_edge(conn, &relationship)?;
            for existing_key in &cross_references {
                contradiction::log_entry(
                    conn,
                    &new_key,
                    existing_key,
                    policy,
                    ContradictionAction::FlagManual,
                    true,
                    "flagged for manual review, existing edge left untouched",
                )?;
            }
            Ok(CreateRelationshipOutcome::Created(new_key))
        }
    }
}

fn insert_edge(conn: &rusqlite::Connection, relationship: &Relationship) -> Result<(), StorageError> {
    let key = relationship.key.clone().unwrap_or_default();
    conn.execute(
        "INSERT INTO edges (collection, key, from_key, to_key, edge_type, doc, created_at, valid_at, invalid_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            RELATIONSHIP_COLLECTION,
            key,
            relationship.from,
            relationship.to,
            relationship.relationship_type,
            serde_json::to_string(relationship).unwrap_or_default(),
            relationship.temporal.created_at.to_rfc3339(),
            relationship.temporal.valid_at.to_rfc3339(),
            relationship.temporal.invalid_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

/// Invalidates an edge: sets the indexed `invalid_at` column and mirrors
/// both it and the superseding edge's key into the `doc` JSON blob's
/// `temporal.invalid_at`/`invalidated_by`, so a document read back never
/// contradicts its own index (§3).
fn invalidate_edge(
    conn: &rusqlite::Connection,
    key: &str,
    t_end: DateTime<Utc>,
    superseded_by: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE edges SET invalid_at = ?1, \
         doc = json_set(json_set(doc, '$.temporal.invalid_at', ?1), '$.invalidated_by', ?2) \
         WHERE collection = ?3 AND key = ?4",
        rusqlite::params![t_end.to_rfc3339(), superseded_by, RELATIONSHIP_COLLECTION, key],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}
