use chrono::Utc;
use noema_core::config::GraphConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult, StorageError};
use noema_core::models::{reinforce, Confidence, Entity};
use noema_storage::vector::l2_normalize;
use noema_storage::Pool;
use serde_json::Value;
use std::sync::Arc;

const ENTITY_COLLECTION: &str = "entities";

pub struct EntityStore {
    pool: Arc<Pool>,
    config: GraphConfig,
}

impl EntityStore {
    pub fn new(pool: Arc<Pool>, config: GraphConfig) -> Self {
        EntityStore { pool, config }
    }

    /// Upserts an entity by `(name, type)` (§4.5): first mention creates
    /// with `confidence = 0.5` unless supplied, subsequent mentions blend
    /// embeddings (arithmetic mean, then L2-renormalize) and reinforce
    /// confidence toward 1 by `alpha * (1 - prior)`.
    pub async fn upsert_entity(
        &self,
        name: String,
        entity_type: String,
        embedding: Option<Vec<f32>>,
        extra: serde_json::Map<String, Value>,
        deadline: Deadline,
    ) -> NoemaResult<String> {
        deadline.check()?;
        let pool = self.pool.clone();
        let alpha = self.config.confidence_reinforce_alpha;
        tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| upsert_entity_sync(conn, &name, &entity_type, embedding, extra, alpha))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))?
        .map_err(NoemaError::from)
    }

    pub async fn get_by_identity(
        &self,
        name: &str,
        entity_type: &str,
        deadline: Deadline,
    ) -> NoemaResult<Option<Entity>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let name = name.to_string();
        let entity_type = entity_type.to_string();
        let result = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| find_entity_by_identity(conn, &name, &entity_type))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;
        Ok(result.map(|(_, entity)| entity))
    }

    pub async fn get(&self, key: &str, deadline: Deadline) -> NoemaResult<Option<Entity>> {
        deadline.check()?;
        let pool = self.pool.clone();
        let key = key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| {
                conn.query_row(
                    "SELECT doc FROM documents WHERE collection = ?1 AND key = ?2",
                    rusqlite::params![ENTITY_COLLECTION, key],
                    |row| row.get::<_, String>(0),
                )
                .map(|json| serde_json::from_str::<Entity>(&json).ok())
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
}

fn find_entity_by_identity(
    conn: &rusqlite::Connection,
    name: &str,
    entity_type: &str,
) -> Result<Option<(String, Entity)>, StorageError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT key, doc FROM documents WHERE collection = ?1 \
             AND json_extract(doc, '$.name') = ?2 AND json_extract(doc, '$.entity_type') = ?3 \
             LIMIT 1",
            rusqlite::params![ENTITY_COLLECTION, name, entity_type],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StorageError::SqliteError {
                message: other.to_string(),
            }),
        })?;
    Ok(match row {
        Some((key, json)) => {
            let entity: Entity = serde_json::from_str(&json).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
            Some((key, entity))
        }
        None => None,
    })
}

fn upsert_entity_sync(
    conn: &rusqlite::Connection,
    name: &str,
    entity_type: &str,
    embedding: Option<Vec<f32>>,
    extra: serde_json::Map<String, Value>,
    alpha: f64,
) -> Result<String, StorageError> {
    match find_entity_by_identity(conn, name, entity_type)? {
        Some((key, mut existing)) => {
            if let Some(new_embedding) = embedding {
                existing.embedding = blend_embeddings(&existing.embedding, &new_embedding);
            }
            existing.confidence = reinforce(existing.confidence, alpha);
            merge_extra(&mut existing, extra);
            conn.execute(
                "UPDATE documents SET doc = ?1 WHERE collection = ?2 AND key = ?3",
                rusqlite::params![
                    serde_json::to_string(&existing).unwrap_or_default(),
                    ENTITY_COLLECTION,
                    key
                ],
            )
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;
            Ok(key)
        }
        None => {
            let key = uuid::Uuid::new_v4().to_string();
            let mut entity = Entity::new(name, entity_type);
            entity.key = Some(key.clone());
            entity.confidence = Confidence::new(0.5);
            if let Some(embedding) = embedding {
                entity.embedding = l2_normalize(&embedding);
            }
            merge_extra(&mut entity, extra);
            conn.execute(
                "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
                 VALUES (?1, ?2, ?3, NULL, ?4, ?4, NULL)",
                rusqlite::params![
                    ENTITY_COLLECTION,
                    key,
                    serde_json::to_string(&entity).unwrap_or_default(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;
            Ok(key)
        }
    }
}

fn blend_embeddings(prior: &[f32], incoming: &[f32]) -> Vec<f32> {
    if prior.is_empty() {
        return l2_normalize(incoming);
    }
    if prior.len() != incoming.len() {
        return l2_normalize(incoming);
    }
    let blended: Vec<f32> = prior
        .iter()
        .zip(incoming.iter())
        .map(|(p, n)| (p + n) / 2.0)
        .collect();
    l2_normalize(&blended)
}

/// Merges extra fields into the entity's attribute bag: new scalars win,
/// list-valued fields union with the prior value (§4.5).
fn merge_extra(entity: &mut Entity, extra: serde_json::Map<String, Value>) {
    for (k, v) in extra {
        match (entity.extra.get(&k).cloned(), &v) {
            (Some(Value::Array(mut existing)), Value::Array(incoming)) => {
                existing.extend(incoming.clone());
                entity.extra.insert(k, Value::Array(existing));
            }
            _ => {
                entity.extra.insert(k, v);
            }
        }
    }
}
