/// Storage-adapter subsystem errors (C1).
///
/// Distinguishes transient (retry-worthy) failures from permanent ones, per
/// §4.1: the caller decides retry policy based on this split.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    SqliteError { message: String },

    #[error("collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("index creation failed: {0}")]
    IndexCreationFailed(String),

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

impl StorageError {
    /// Whether this error is transient (connection/timeout) and worth a
    /// bounded exponential-backoff retry at the adapter boundary (§7), as
    /// opposed to permanent (schema/missing-object) errors that should
    /// propagate immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionTimeout(_) | StorageError::TransactionAborted(_)
        )
    }
}
