//! Episode Manager (C10): CRUD over the Episode entity, current-episode
//! lookup, idempotent close, and conversation resolution.

use chrono::Utc;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaResult, StorageError};
use noema_core::models::{CloseOutcome, Episode, Memory};
use noema_storage::pool::Pool;
use rusqlite::Connection;
use std::sync::Arc;

const EPISODE_COLLECTION: &str = "episodes";

pub struct EpisodeManager {
    pool: Arc<Pool>,
}

impl EpisodeManager {
    pub fn new(pool: Arc<Pool>) -> Self {
        EpisodeManager { pool }
    }

    pub async fn open(&self, title: String, event_type: String, deadline: Deadline) -> NoemaResult<String> {
        deadline.check()?;
        let episode = Episode::open(title, event_type, Utc::now());
        let pool = self.pool.clone();
        let key = tokio::task::spawn_blocking(move || pool.with_write(|conn| insert_episode(conn, episode)))
            .await
            .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(key)
    }

    pub async fn get(&self, key: &str, deadline: Deadline) -> NoemaResult<Option<Episode>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let key = key.to_string();
        let episode = tokio::task::spawn_blocking(move || pool.with_read(|conn| fetch_episode(conn, &key)))
            .await
            .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(episode)
    }

    /// Most recently opened episode still marked active, if any.
    pub async fn current(&self, deadline: Deadline) -> NoemaResult<Option<Episode>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let episode = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                conn.query_row(
                    "SELECT doc FROM documents WHERE collection = ?1 AND json_extract(doc, '$.is_active') = 1 \
                     ORDER BY created_at DESC LIMIT 1",
                    rusqlite::params![EPISODE_COLLECTION],
                    |row| row.get::<_, String>(0),
                )
                .map(|json| serde_json::from_str::<Episode>(&json).ok())
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(StorageError::SqliteError { message: other.to_string() }),
                })
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(episode)
    }

    /// Idempotent w.r.t. an already-closed episode (§4.10): returns a typed
    /// signal rather than an error when `key` is not currently active.
    pub async fn close(&self, key: &str, deadline: Deadline) -> NoemaResult<CloseOutcome> {
        deadline.check()?;
        let pool = self.pool.clone();
        let key = key.to_string();
        let outcome = tokio::task::spawn_blocking(move || pool.with_write(|conn| close_episode(conn, &key)))
            .await
            .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(outcome)
    }

    /// Memory documents carrying this episode's `episode_id`.
    pub async fn conversations(&self, episode_id: &str, deadline: Deadline) -> NoemaResult<Vec<Memory>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let episode_id = episode_id.to_string();
        let memories = tokio::task::spawn_blocking(move || pool.with_read(|conn| fetch_conversations(conn, &episode_id)))
            .await
            .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(memories)
    }
}

fn insert_episode(conn: &Connection, mut episode: Episode) -> Result<String, StorageError> {
    let key = uuid::Uuid::new_v4().to_string();
    episode.key = Some(key.clone());
    conn.execute(
        "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
         VALUES (?1, ?2, ?3, NULL, ?4, ?4, NULL)",
        rusqlite::params![
            EPISODE_COLLECTION,
            key,
            serde_json::to_string(&episode).unwrap_or_default(),
            episode.start_time.to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(key)
}

fn fetch_episode(conn: &Connection, key: &str) -> Result<Option<Episode>, StorageError> {
    conn.query_row(
        "SELECT doc FROM documents WHERE collection = ?1 AND key = ?2",
        rusqlite::params![EPISODE_COLLECTION, key],
        |row| row.get::<_, String>(0),
    )
    .map(|json| serde_json::from_str(&json).ok())
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError { message: other.to_string() }),
    })
}

fn close_episode(conn: &Connection, key: &str) -> Result<CloseOutcome, StorageError> {
    let Some(mut episode) = fetch_episode(conn, key)? else {
        return Ok(CloseOutcome::AlreadyClosed);
    };
    if !episode.is_active {
        return Ok(CloseOutcome::AlreadyClosed);
    }
    episode.is_active = false;
    episode.end_time = Some(Utc::now());
    conn.execute(
        "UPDATE documents SET doc = ?1 WHERE collection = ?2 AND key = ?3",
        rusqlite::params![serde_json::to_string(&episode).unwrap_or_default(), EPISODE_COLLECTION, key],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(CloseOutcome::Closed)
}

fn fetch_conversations(conn: &Connection, episode_id: &str) -> Result<Vec<Memory>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT doc FROM documents WHERE collection = 'memories' \
             AND json_extract(doc, '$.episode_id') = ?1 AND invalid_at IS NULL",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(rusqlite::params![episode_id], |row| row.get::<_, String>(0))
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let mut out = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        let memory: Memory = serde_json::from_str(&raw).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
        out.push(memory);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_storage::StorageEngine;

    fn engine() -> StorageEngine {
        StorageEngine::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn closing_twice_is_idempotent_not_an_error() {
        let storage = engine();
        let manager = EpisodeManager::new(storage.pool().clone());
        let deadline = Deadline::unbounded();
        let key = manager.open("trip planning".to_string(), "session".to_string(), deadline).await.unwrap();
        assert_eq!(manager.close(&key, deadline).await.unwrap(), CloseOutcome::Closed);
        assert_eq!(manager.close(&key, deadline).await.unwrap(), CloseOutcome::AlreadyClosed);
    }

    #[tokio::test]
    async fn current_returns_the_most_recently_opened_active_episode() {
        let storage = engine();
        let manager = EpisodeManager::new(storage.pool().clone());
        let deadline = Deadline::unbounded();
        manager.open("first".to_string(), "session".to_string(), deadline).await.unwrap();
        let second = manager.open("second".to_string(), "session".to_string(), deadline).await.unwrap();
        let current = manager.current(deadline).await.unwrap().expect("an active episode");
        assert_eq!(current.key, Some(second));
    }
}
