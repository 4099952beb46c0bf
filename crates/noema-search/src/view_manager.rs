//! Search-view lifecycle (C3): decides whether an FTS5 view needs to be
//! (re)created for a given field configuration, per the configured
//! [`ViewPolicy`].

use noema_core::errors::{NoemaResult, StorageError};
use noema_core::models::ViewPolicy;
use noema_core::traits::ViewFieldConfig;
use noema_storage::pool::Pool;
use noema_storage::{fts5, view_hash};
use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;

pub struct ViewManager {
    pool: Arc<Pool>,
}

impl ViewManager {
    pub fn new(pool: Arc<Pool>) -> Self {
        ViewManager { pool }
    }

    /// Ensures `name` exists over `collection` with exactly `fields`
    /// indexed. Returns whether the view was (re)created; `false` means an
    /// equivalent view already existed and nothing changed (§4.3).
    pub async fn ensure_view(
        &self,
        name: &str,
        collection: &str,
        fields: Vec<ViewFieldConfig>,
        policy: ViewPolicy,
    ) -> NoemaResult<bool> {
        let pool = self.pool.clone();
        let name = name.to_string();
        let collection = collection.to_string();
        let recreated = tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| ensure_view_sync(conn, &name, &collection, &fields, policy))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(recreated)
    }

    /// Adds a second collection's rows into an already-created view (§11).
    pub async fn add_linked_collection(
        &self,
        view: &str,
        collection: &str,
        fields: Vec<ViewFieldConfig>,
    ) -> NoemaResult<()> {
        let pool = self.pool.clone();
        let view = view.to_string();
        let collection = collection.to_string();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| fts5::add_linked_collection(conn, &view, &collection, &fields))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }
}

fn ensure_view_sync(
    conn: &Connection,
    name: &str,
    collection: &str,
    fields: &[ViewFieldConfig],
    policy: ViewPolicy,
) -> Result<bool, StorageError> {
    let existing_hash = existing_config_hash(conn, name)?;
    match policy {
        ViewPolicy::NeverRecreate => {
            if existing_hash.is_some() {
                return Ok(false);
            }
            create_and_register(conn, name, collection, fields)?;
            Ok(true)
        }
        ViewPolicy::AlwaysRecreate => {
            if existing_hash.is_some() {
                fts5::drop_view(conn, name)?;
            }
            create_and_register(conn, name, collection, fields)?;
            tracing::info!(view = name, "view recreated (always_recreate policy)");
            Ok(true)
        }
        ViewPolicy::CheckConfig => {
            let new_hash = view_hash::normalized_hash(fields);
            if existing_hash.as_deref() == Some(new_hash.as_str()) {
                return Ok(false);
            }
            if existing_hash.is_some() {
                fts5::drop_view(conn, name)?;
            }
            create_and_register(conn, name, collection, fields)?;
            tracing::info!(view = name, "view recreated (config changed)");
            Ok(true)
        }
    }
}

fn create_and_register(
    conn: &Connection,
    name: &str,
    collection: &str,
    fields: &[ViewFieldConfig],
) -> Result<(), StorageError> {
    fts5::create_view(conn, name, collection, fields)?;
    let config = serde_json::to_string(fields).unwrap_or_default();
    let hash = view_hash::normalized_hash(fields);
    conn.execute(
        "INSERT OR REPLACE INTO view_registry (name, config, config_hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![name, config, hash],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(())
}

fn existing_config_hash(conn: &Connection, name: &str) -> Result<Option<String>, StorageError> {
    conn.query_row(
        "SELECT config_hash FROM view_registry WHERE name = ?1",
        rusqlite::params![name],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })
}
