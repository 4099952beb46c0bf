//! Reconstructs the unified [`Document`] sum type from raw stored JSON.
//!
//! Rows land in the generic `documents`/`edges` tables without the `kind`
//! discriminator `Document`'s `#[serde(tag = "kind")]` expects — that tag is
//! a search-layer concept, not a storage one. Every search method goes
//! through here rather than deserializing straight into `Document`.

use noema_core::errors::StorageError;
use noema_core::models::{CompactionRecord, Document, Entity, Memory, Message, Relationship};
use rusqlite::Connection;
use serde_json::Value;

pub const MESSAGES: &str = "messages";
pub const MEMORIES: &str = "memories";
pub const ENTITIES: &str = "entities";
pub const RELATIONSHIPS: &str = "relationships";
pub const COMPACTIONS: &str = "compactions";

/// Vertex-like collections that are scanned for BM25/vector/tag/keyword hits.
/// `relationships` is an edge collection and is only reached by graph traversal.
pub const VERTEX_COLLECTIONS: &[&str] = &[MESSAGES, MEMORIES, ENTITIES, COMPACTIONS];

fn to_storage_err(e: serde_json::Error) -> StorageError {
    StorageError::SchemaMismatch(e.to_string())
}

/// Builds a `Document` from a raw JSON body given the collection it came
/// from. Returns `None` for an unknown collection name.
pub fn to_document(collection: &str, doc: Value) -> Result<Option<Document>, StorageError> {
    let document = match collection {
        MESSAGES => Document::Message(serde_json::from_value::<Message>(doc).map_err(to_storage_err)?),
        MEMORIES => Document::Memory(serde_json::from_value::<Memory>(doc).map_err(to_storage_err)?),
        ENTITIES => Document::Entity(serde_json::from_value::<Entity>(doc).map_err(to_storage_err)?),
        RELATIONSHIPS => {
            Document::Relationship(serde_json::from_value::<Relationship>(doc).map_err(to_storage_err)?)
        }
        COMPACTIONS => {
            Document::Compaction(serde_json::from_value::<CompactionRecord>(doc).map_err(to_storage_err)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(document))
}

/// One raw row scanned from `documents`, prior to `Document` reconstruction.
pub struct RawRow {
    pub key: String,
    pub collection: String,
    pub doc: Value,
}

/// Scans every currently-valid row of a vertex collection. Brute-force by
/// design (§4.2/§4.7): this backend has no native ANN operator, so vector
/// search's Stage 1 and the tag/keyword methods all read the full live set.
pub fn scan_collection(conn: &Connection, collection: &str) -> Result<Vec<RawRow>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT key, doc FROM documents WHERE collection = ?1 AND invalid_at IS NULL")
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(rusqlite::params![collection], |row| {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((key, raw))
        })
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let mut out = Vec::new();
    for row in rows {
        let (key, raw) = row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        let doc: Value = serde_json::from_str(&raw).map_err(to_storage_err)?;
        out.push(RawRow { key, collection: collection.to_string(), doc });
    }
    Ok(out)
}

pub fn scan_collections(conn: &Connection, collections: &[&str]) -> Result<Vec<RawRow>, StorageError> {
    let mut out = Vec::new();
    for collection in collections {
        out.extend(scan_collection(conn, collection)?);
    }
    Ok(out)
}

pub fn fetch_one(conn: &Connection, collection: &str, key: &str) -> Result<Option<RawRow>, StorageError> {
    let raw = conn.query_row(
        "SELECT doc FROM documents WHERE collection = ?1 AND key = ?2",
        rusqlite::params![collection, key],
        |row| row.get::<_, String>(0),
    );
    let raw = match raw {
        Ok(raw) => raw,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(other) => return Err(StorageError::SqliteError { message: other.to_string() }),
    };
    let doc: Value = serde_json::from_str(&raw).map_err(to_storage_err)?;
    Ok(Some(RawRow { key: key.to_string(), collection: collection.to_string(), doc }))
}

/// Reads a document's `tags` field. Supplemented (§11): callers may carry
/// tags either top-level (`doc.tags`) or nested under `metadata.tags`
/// (`Memory`'s free-form bag), so both shapes are checked.
pub fn extract_tags(doc: &Value) -> Vec<String> {
    let array = doc
        .get("tags")
        .or_else(|| doc.get("metadata").and_then(|m| m.get("tags")))
        .and_then(Value::as_array);
    match array {
        Some(values) => values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        None => Vec::new(),
    }
}

pub fn extract_embedding(doc: &Value) -> Vec<f32> {
    doc.get("embedding")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
        .unwrap_or_default()
}
