mod v001_initial_schema;

use chrono::Utc;
use noema_core::errors::StorageError;
use rusqlite::Connection;

pub const LATEST_VERSION: i64 = 1;

type MigrationFn = fn(&Connection) -> Result<(), StorageError>;

const MIGRATIONS: &[(i64, &str, MigrationFn)] = &[(1, "initial_schema", v001_initial_schema::migrate)];

/// Applies every migration above the database's current version, each in
/// its own transaction, forward-only.
pub fn run_migrations(conn: &mut Connection) -> Result<(), StorageError> {
    let current = current_version(conn)?;
    for (version, name, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        tracing::info!(version, name, "applying migration");
        let tx = conn.transaction().map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
        migrate(&tx)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![version, name, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::MigrationFailed {
            version: *version as u32,
            reason: e.to_string(),
        })?;
        tx.commit().map_err(|e| StorageError::MigrationFailed {
            version: *version as u32,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i64, StorageError> {
    let table_exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    if !table_exists {
        return Ok(0);
    }
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })
}
