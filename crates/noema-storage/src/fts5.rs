use noema_core::errors::StorageError;
use noema_core::traits::ViewFieldConfig;
use rusqlite::Connection;

/// FTS5-backed search view. The view name becomes the virtual table name.
pub fn view_table_name(view: &str) -> String {
    format!("view_{view}")
}

pub fn create_view(
    conn: &Connection,
    name: &str,
    collection: &str,
    fields: &[ViewFieldConfig],
) -> Result<(), StorageError> {
    let table = view_table_name(name);
    let columns = fields
        .iter()
        .map(|f| f.field.clone())
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE {table} USING fts5(doc_key UNINDEXED, source_collection UNINDEXED, {columns});"
    ))
    .map_err(|e| StorageError::IndexCreationFailed(e.to_string()))?;
    index_collection(conn, &table, collection, fields)
}

/// Adds a second linked collection's rows to an existing view without
/// recreating it (§11 supplemented feature).
pub fn add_linked_collection(
    conn: &Connection,
    view: &str,
    collection: &str,
    fields: &[ViewFieldConfig],
) -> Result<(), StorageError> {
    let table = view_table_name(view);
    index_collection(conn, &table, collection, fields)
}

pub fn drop_view(conn: &Connection, name: &str) -> Result<(), StorageError> {
    let table = view_table_name(name);
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })
}

fn index_collection(
    conn: &Connection,
    fts_table: &str,
    collection: &str,
    fields: &[ViewFieldConfig],
) -> Result<(), StorageError> {
    let extracts = fields
        .iter()
        .map(|f| format!("json_extract(doc, '$.{}')", f.field))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_cols = format!(
        "doc_key, source_collection, {}",
        fields
            .iter()
            .map(|f| f.field.clone())
            .collect::<Vec<_>>()
            .join(", ")
    );
    conn.execute(
        &format!(
            "INSERT INTO {fts_table} ({insert_cols}) \
             SELECT key, collection, {extracts} FROM documents \
             WHERE collection = ?1 AND invalid_at IS NULL"
        ),
        rusqlite::params![collection],
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub doc_key: String,
    pub source_collection: String,
    pub score: f64,
}

/// Runs a BM25-scored match against the view.
pub fn search_bm25(
    conn: &Connection,
    view: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Bm25Hit>, StorageError> {
    let table = view_table_name(view);
    let sql = format!(
        "SELECT doc_key, source_collection, bm25({table}) AS score FROM {table} WHERE {table} MATCH ?1 ORDER BY score LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    let rows = stmt
        .query_map(rusqlite::params![query, limit as i64], |row| {
            Ok(Bm25Hit {
                doc_key: row.get(0)?,
                source_collection: row.get(1)?,
                // FTS5 bm25() is lower-is-better; negate so higher is
                // better, consistent with every other engine's scoring.
                score: -row.get::<_, f64>(2)?,
            })
        })
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })
}
