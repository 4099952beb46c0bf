use crate::pool::Pool;
use crate::{fts5, migrations};
use chrono::Utc;
use dashmap::DashSet;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaResult, StorageError};
use noema_core::traits::{IndexMetric, StorageAdapter, ViewFieldConfig};
use serde_json::Value;
use std::sync::Arc;

/// SQLite-backed implementation of [`StorageAdapter`]. `ensure_*` calls are
/// idempotent; edge-collection membership is tracked in-process so that
/// `create_document`/`update_document` know whether to route a write to the
/// generic `documents` table or the typed `edges` table.
pub struct StorageEngine {
    pool: Arc<Pool>,
    edge_collections: DashSet<String>,
}

impl StorageEngine {
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let mut pool = Pool::open_in_memory()?;
        pool.with_write_mut(|conn| migrations::run_migrations(conn))?;
        Ok(StorageEngine {
            pool: Arc::new(pool),
            edge_collections: DashSet::new(),
        })
    }

    pub fn open(path: &str) -> Result<Self, StorageError> {
        let mut pool = Pool::open(path)?;
        pool.with_write_mut(|conn| migrations::run_migrations(conn))?;
        Ok(StorageEngine {
            pool: Arc::new(pool),
            edge_collections: DashSet::new(),
        })
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    fn is_edge_collection(&self, name: &str) -> bool {
        self.edge_collections.contains(name)
    }
}

fn fresh_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[allow(async_fn_in_trait)]
impl StorageAdapter for StorageEngine {
    async fn ensure_collection(&self, _name: &str, _deadline: Deadline) -> NoemaResult<()> {
        // Vertex-like collections share the generic `documents` table;
        // nothing to create per-name, this call is a pure no-op for
        // idempotence bookkeeping only.
        Ok(())
    }

    async fn ensure_edge_collection(&self, name: &str, _deadline: Deadline) -> NoemaResult<()> {
        self.edge_collections.insert(name.to_string());
        Ok(())
    }

    async fn ensure_graph(
        &self,
        _name: &str,
        edge_collection: &str,
        _vertex_collections: &[String],
        _deadline: Deadline,
    ) -> NoemaResult<()> {
        self.edge_collections.insert(edge_collection.to_string());
        Ok(())
    }

    async fn ensure_vector_index(
        &self,
        _collection: &str,
        _field: &str,
        _dim: usize,
        _metric: IndexMetric,
        _n_lists: usize,
        _deadline: Deadline,
    ) -> NoemaResult<()> {
        // No native ANN operator on this backend; vector search always
        // runs the manual-cosine path (see `vector.rs`). Idempotent no-op.
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
        _deadline: Deadline,
    ) -> NoemaResult<Option<Value>> {
        let is_edge = self.is_edge_collection(collection);
        let collection = collection.to_string();
        let key = key.to_string();
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                if is_edge {
                    get_edge_doc(conn, &collection, &key)
                } else {
                    get_vertex_doc(conn, &collection, &key)
                }
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(result)
    }

    async fn create_document(
        &self,
        collection: &str,
        doc: Value,
        _deadline: Deadline,
    ) -> NoemaResult<String> {
        let is_edge = self.is_edge_collection(collection);
        let collection = collection.to_string();
        let pool = self.pool.clone();
        let key = tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                if is_edge {
                    insert_edge_doc(conn, &collection, doc)
                } else {
                    insert_vertex_doc(conn, &collection, doc)
                }
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(key)
    }

    async fn update_document(
        &self,
        collection: &str,
        key: &str,
        patch: Value,
        _deadline: Deadline,
    ) -> NoemaResult<()> {
        let is_edge = self.is_edge_collection(collection);
        let collection = collection.to_string();
        let key = key.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                if is_edge {
                    update_edge_doc(conn, &collection, &key, patch)
                } else {
                    update_vertex_doc(conn, &collection, &key, patch)
                }
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, key: &str, _deadline: Deadline) -> NoemaResult<()> {
        let is_edge = self.is_edge_collection(collection);
        let collection = collection.to_string();
        let key = key.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                let table = if is_edge { "edges" } else { "documents" };
                conn.execute(
                    &format!("DELETE FROM {table} WHERE collection = ?1 AND key = ?2"),
                    rusqlite::params![collection, key],
                )
                .map_err(|e| StorageError::SqliteError {
                    message: e.to_string(),
                })?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }

    async fn execute_query(
        &self,
        text: &str,
        bind_vars: Value,
        _deadline: Deadline,
    ) -> NoemaResult<Vec<Value>> {
        let text = text.to_string();
        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| crate::query::run_named_query(conn, &text, &bind_vars))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(rows)
    }

    async fn view_config(
        &self,
        name: &str,
        _deadline: Deadline,
    ) -> NoemaResult<Option<Vec<ViewFieldConfig>>> {
        let name = name.to_string();
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                conn.query_row(
                    "SELECT config FROM view_registry WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get::<_, String>(0),
                )
                .map(|json| serde_json::from_str::<Vec<ViewFieldConfig>>(&json).ok())
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(StorageError::SqliteError {
                        message: other.to_string(),
                    }),
                })
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(result)
    }

    async fn create_view(
        &self,
        name: &str,
        collection: &str,
        fields: &[ViewFieldConfig],
        _deadline: Deadline,
    ) -> NoemaResult<()> {
        let name = name.to_string();
        let collection = collection.to_string();
        let fields = fields.to_vec();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                fts5::create_view(conn, &name, &collection, &fields)?;
                register_view(conn, &name, &fields)
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }

    async fn add_linked_collection(
        &self,
        view: &str,
        collection: &str,
        fields: &[ViewFieldConfig],
        _deadline: Deadline,
    ) -> NoemaResult<()> {
        let view = view.to_string();
        let collection = collection.to_string();
        let fields = fields.to_vec();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| fts5::add_linked_collection(conn, &view, &collection, &fields))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }

    async fn delete_view(&self, name: &str, _deadline: Deadline) -> NoemaResult<()> {
        let name = name.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                fts5::drop_view(conn, &name)?;
                conn.execute("DELETE FROM view_registry WHERE name = ?1", rusqlite::params![name])
                    .map_err(|e| StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(())
    }
}

fn register_view(conn: &rusqlite::Connection, name: &str, fields: &[ViewFieldConfig]) -> Result<(), StorageError> {
    let config = serde_json::to_string(fields).unwrap_or_default();
    let hash = crate::view_hash::normalized_hash(fields);
    conn.execute(
        "INSERT OR REPLACE INTO view_registry (name, config, config_hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![name, config, hash],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

fn get_vertex_doc(conn: &rusqlite::Connection, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
    conn.query_row(
        "SELECT doc FROM documents WHERE collection = ?1 AND key = ?2",
        rusqlite::params![collection, key],
        |row| row.get::<_, String>(0),
    )
    .map(|json| serde_json::from_str(&json).ok())
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError {
            message: other.to_string(),
        }),
    })
}

fn get_edge_doc(conn: &rusqlite::Connection, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
    conn.query_row(
        "SELECT doc FROM edges WHERE collection = ?1 AND key = ?2",
        rusqlite::params![collection, key],
        |row| row.get::<_, String>(0),
    )
    .map(|json| serde_json::from_str(&json).ok())
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError {
            message: other.to_string(),
        }),
    })
}

fn insert_vertex_doc(conn: &rusqlite::Connection, collection: &str, mut doc: Value) -> Result<String, StorageError> {
    let key = doc
        .get("key")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(fresh_key);
    if let Value::Object(ref mut map) = doc {
        map.insert("key".to_string(), Value::String(key.clone()));
    }
    let conversation_id = doc.get("conversation_id").and_then(|v| v.as_str()).map(str::to_string);
    let created_at = doc
        .get("temporal")
        .and_then(|t| t.get("created_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let valid_at = doc
        .get("temporal")
        .and_then(|t| t.get("valid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| created_at.clone());
    let invalid_at = doc
        .get("temporal")
        .and_then(|t| t.get("invalid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    conn.execute(
        "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            collection,
            key,
            serde_json::to_string(&doc).unwrap_or_default(),
            conversation_id,
            created_at,
            valid_at,
            invalid_at
        ],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(key)
}

fn insert_edge_doc(conn: &rusqlite::Connection, collection: &str, mut doc: Value) -> Result<String, StorageError> {
    let key = doc
        .get("key")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(fresh_key);
    if let Value::Object(ref mut map) = doc {
        map.insert("key".to_string(), Value::String(key.clone()));
    }
    let from_key = doc
        .get("from")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StorageError::SchemaMismatch("edge document missing 'from'".to_string()))?
        .to_string();
    let to_key = doc
        .get("to")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StorageError::SchemaMismatch("edge document missing 'to'".to_string()))?
        .to_string();
    let edge_type = doc
        .get("relationship_type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let created_at = doc
        .get("temporal")
        .and_then(|t| t.get("created_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let valid_at = doc
        .get("temporal")
        .and_then(|t| t.get("valid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| created_at.clone());
    let invalid_at = doc
        .get("temporal")
        .and_then(|t| t.get("invalid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    conn.execute(
        "INSERT INTO edges (collection, key, from_key, to_key, edge_type, doc, created_at, valid_at, invalid_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            collection,
            key,
            from_key,
            to_key,
            edge_type,
            serde_json::to_string(&doc).unwrap_or_default(),
            created_at,
            valid_at,
            invalid_at
        ],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(key)
}

fn update_vertex_doc(
    conn: &rusqlite::Connection,
    collection: &str,
    key: &str,
    patch: Value,
) -> Result<(), StorageError> {
    let existing = get_vertex_doc(conn, collection, key)?.ok_or_else(|| {
        StorageError::DocumentNotFound {
            id: format!("{collection}/{key}"),
        }
    })?;
    let merged = merge_json(existing, patch);
    let invalid_at = merged
        .get("temporal")
        .and_then(|t| t.get("invalid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    conn.execute(
        "UPDATE documents SET doc = ?1, invalid_at = ?2 WHERE collection = ?3 AND key = ?4",
        rusqlite::params![serde_json::to_string(&merged).unwrap_or_default(), invalid_at, collection, key],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

fn update_edge_doc(
    conn: &rusqlite::Connection,
    collection: &str,
    key: &str,
    patch: Value,
) -> Result<(), StorageError> {
    let existing = get_edge_doc(conn, collection, key)?.ok_or_else(|| StorageError::DocumentNotFound {
        id: format!("{collection}/{key}"),
    })?;
    let merged = merge_json(existing, patch);
    let invalid_at = merged
        .get("temporal")
        .and_then(|t| t.get("invalid_at"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    conn.execute(
        "UPDATE edges SET doc = ?1, invalid_at = ?2 WHERE collection = ?3 AND key = ?4",
        rusqlite::params![serde_json::to_string(&merged).unwrap_or_default(), invalid_at, collection, key],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

fn merge_json(mut base: Value, patch: Value) -> Value {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (&mut base, patch) {
        for (k, v) in patch_map {
            base_map.insert(k, v);
        }
    }
    base
}
