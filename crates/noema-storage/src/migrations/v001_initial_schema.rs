use noema_core::errors::StorageError;
use rusqlite::Connection;

/// Forward-only schema bootstrap. Two generic multi-model tables back every
/// vertex-like and edge-like collection from §6 (`documents`/`edges`,
/// mirroring the document/edge-collection split the original ArangoDB
/// implementation exposes), plus the contradiction log, invalidation event
/// log, and view registry as dedicated tables. `doc` carries the full JSON
/// body; a handful of columns are pulled out for the indexes §4.4 asks for
/// (`valid_at`, `invalid_at`, and their composites with `conversation_id`
/// and entity-pair keys).
pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE documents (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            doc TEXT NOT NULL,
            conversation_id TEXT,
            created_at TEXT NOT NULL,
            valid_at TEXT NOT NULL,
            invalid_at TEXT,
            PRIMARY KEY (collection, key)
        );
        CREATE INDEX idx_documents_valid ON documents(collection, valid_at, invalid_at);
        CREATE INDEX idx_documents_conversation ON documents(collection, conversation_id, valid_at, invalid_at);

        CREATE TABLE edges (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            from_key TEXT NOT NULL,
            to_key TEXT NOT NULL,
            edge_type TEXT NOT NULL,
            doc TEXT NOT NULL,
            created_at TEXT NOT NULL,
            valid_at TEXT NOT NULL,
            invalid_at TEXT,
            PRIMARY KEY (collection, key)
        );
        CREATE INDEX idx_edges_valid ON edges(collection, valid_at, invalid_at);
        CREATE INDEX idx_edges_pair ON edges(collection, from_key, to_key, edge_type, valid_at, invalid_at);
        CREATE INDEX idx_edges_from_type ON edges(collection, from_key, edge_type, invalid_at);

        CREATE TABLE contradiction_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            new_edge TEXT NOT NULL,
            existing_edge TEXT NOT NULL,
            strategy TEXT NOT NULL,
            action TEXT NOT NULL,
            success INTEGER NOT NULL,
            reason TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            context TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE invalidation_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            doc_key TEXT NOT NULL,
            t_end TEXT NOT NULL,
            cause TEXT NOT NULL,
            actor TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );

        CREATE TABLE view_registry (
            name TEXT PRIMARY KEY,
            config TEXT NOT NULL,
            config_hash TEXT NOT NULL
        );

        CREATE TABLE schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| StorageError::MigrationFailed {
        version: 1,
        reason: e.to_string(),
    })
}
