use chrono::{DateTime, Utc};
use noema_core::errors::StorageError;
use rusqlite::Connection;

/// One `(key, t_end, cause, actor)` record emitted on every invalidation
/// (§4.4).
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub collection: String,
    pub doc_key: String,
    pub t_end: DateTime<Utc>,
    pub cause: String,
    pub actor: String,
}

pub fn record(conn: &Connection, event: &InvalidationEvent) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO invalidation_events (collection, doc_key, t_end, cause, actor, recorded_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.collection,
            event.doc_key,
            event.t_end.to_rfc3339(),
            event.cause,
            event.actor,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}
