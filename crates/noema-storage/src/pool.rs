use noema_core::errors::StorageError;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Single-writer-connection, small-read-pool split (§5: "the single-writer
/// connection design"). One `Mutex<Connection>` serializes writes under
/// WAL, a handful of read-only connections allow concurrent queries
/// alongside them.
pub struct Pool {
    write: Mutex<Connection>,
    reads: Vec<Mutex<Connection>>,
    next_read: AtomicUsize,
}

const READ_POOL_SIZE: usize = 4;

impl Pool {
    /// A named shared-cache in-memory database: every connection opened
    /// against this URI within the process sees the same data, unlike a
    /// bare `:memory:` path (which is private per-connection).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let uri = format!(
            "file:noema_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        Self::open(&uri)
    }

    pub fn open(path: &str) -> Result<Self, StorageError> {
        let write = open_connection(path)?;
        write
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;

        let mut reads = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = open_connection(path)?;
            conn.execute_batch("PRAGMA query_only=ON;")
                .map_err(|e| StorageError::SqliteError {
                    message: e.to_string(),
                })?;
            reads.push(Mutex::new(conn));
        }

        Ok(Pool {
            write: Mutex::new(write),
            reads,
            next_read: AtomicUsize::new(0),
        })
    }

    /// Runs `f` with exclusive `&mut Connection` access to the writer, used
    /// only for migrations (which need `Connection::transaction`).
    pub fn with_write_mut<T>(
        &mut self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.write.get_mut().map_err(|_| {
            StorageError::TransactionAborted("write connection mutex poisoned".to_string())
        })?;
        f(conn)
    }

    pub fn with_write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.write.lock().map_err(|_| {
            StorageError::TransactionAborted("write connection mutex poisoned".to_string())
        })?;
        f(&conn)
    }

    pub fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let idx = self.next_read.fetch_add(1, Ordering::Relaxed) % self.reads.len();
        let conn = self.reads[idx].lock().map_err(|_| {
            StorageError::TransactionAborted("read connection mutex poisoned".to_string())
        })?;
        f(&conn)
    }
}

fn open_connection(path: &str) -> Result<Connection, StorageError> {
    let result = if path.starts_with("file:") {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(path, flags)
    } else if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(Path::new(path))
    };
    result.map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })
}
