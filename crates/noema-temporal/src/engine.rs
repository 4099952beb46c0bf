use crate::event_log::{self, InvalidationEvent};
use chrono::{DateTime, Utc};
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult, StorageError};
use noema_storage::Pool;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Vertex,
    Edge,
}

impl CollectionKind {
    fn table(self) -> &'static str {
        match self {
            CollectionKind::Vertex => "documents",
            CollectionKind::Edge => "edges",
        }
    }
}

/// Bi-temporal stamping, invalidation, and point-in-time queries (C4), run
/// directly against the storage pool the way the teacher's temporal
/// subsystem talks straight to its own storage crate's connection pool.
pub struct TemporalEngine {
    pool: Arc<Pool>,
}

impl TemporalEngine {
    pub fn new(pool: Arc<Pool>) -> Self {
        TemporalEngine { pool }
    }

    /// Sets `invalid_at = t_end` if currently null, mirroring it (and the
    /// superseding key, if any) into the `doc` JSON blob's
    /// `temporal.invalid_at`/`invalidated_by` alongside the indexed column
    /// (§3); emits an invalidation event. Double-invalidation with
    /// `t_end >= existing invalid_at` is a no-op; an earlier `t_end` raises
    /// *invariant-violation* (§4.4).
    pub async fn invalidate(
        &self,
        collection: &str,
        kind: CollectionKind,
        key: &str,
        t_end: DateTime<Utc>,
        cause: String,
        actor: String,
        superseded_by: Option<String>,
        deadline: Deadline,
    ) -> NoemaResult<()> {
        deadline.check()?;
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let key = key.to_string();
        let collection_for_err = collection.clone();
        let key_for_err = key.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                let table = kind.table();
                let existing: Option<String> = conn
                    .query_row(
                        &format!("SELECT invalid_at FROM {table} WHERE collection = ?1 AND key = ?2"),
                        rusqlite::params![collection, key],
                        |row| row.get(0),
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => StorageError::DocumentNotFound {
                            id: format!("{collection}/{key}"),
                        },
                        other => StorageError::SqliteError {
                            message: other.to_string(),
                        },
                    })?;

                match existing {
                    None => {
                        conn.execute(
                            &format!(
                                "UPDATE {table} SET invalid_at = ?1, \
                                 doc = json_set(json_set(doc, '$.temporal.invalid_at', ?1), '$.invalidated_by', ?2) \
                                 WHERE collection = ?3 AND key = ?4"
                            ),
                            rusqlite::params![t_end.to_rfc3339(), superseded_by, collection, key],
                        )
                        .map_err(|e| StorageError::SqliteError {
                            message: e.to_string(),
                        })?;
                        event_log::record(
                            conn,
                            &InvalidationEvent {
                                collection: collection.clone(),
                                doc_key: key.clone(),
                                t_end,
                                cause: cause.clone(),
                                actor: actor.clone(),
                            },
                        )?;
                        Ok(InvalidateOutcome::Invalidated)
                    }
                    Some(raw) => {
                        let current: DateTime<Utc> = raw
                            .parse()
                            .map_err(|_| StorageError::SchemaMismatch("invalid_at not RFC3339".to_string()))?;
                        if t_end >= current {
                            Ok(InvalidateOutcome::AlreadyInvalidated)
                        } else {
                            Ok(InvalidateOutcome::InvariantViolation)
                        }
                    }
                }
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))?
        .map_err(NoemaError::from)
        .and_then(|outcome| match outcome {
            InvalidateOutcome::Invalidated | InvalidateOutcome::AlreadyInvalidated => Ok(()),
            InvalidateOutcome::InvariantViolation => Err(NoemaError::InvariantViolation(format!(
                "invalidate({collection_name}/{key_name}): t_end precedes the existing invalid_at",
                collection_name = collection_for_err,
                key_name = key_for_err,
            ))),
        })
    }

    /// Point-in-time query: documents/edges where
    /// `valid_at <= t AND (invalid_at IS NULL OR invalid_at > t)` (§4.4).
    pub async fn point_in_time(
        &self,
        collection: &str,
        kind: CollectionKind,
        t: DateTime<Utc>,
        deadline: Deadline,
    ) -> NoemaResult<Vec<Value>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let t_str = t.to_rfc3339();
        let rows = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                let table = kind.table();
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT doc FROM {table} WHERE collection = ?1 AND valid_at <= ?2 \
                         AND (invalid_at IS NULL OR invalid_at > ?2)"
                    ))
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map(rusqlite::params![collection, t_str], |row| row.get::<_, String>(0))
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

        Ok(rows
            .into_iter()
            .filter_map(|json| serde_json::from_str::<Value>(&json).ok())
            .collect())
    }
}

enum InvalidateOutcome {
    Invalidated,
    AlreadyInvalidated,
    InvariantViolation,
}
