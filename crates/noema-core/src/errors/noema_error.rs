use super::{EmbeddingError, RetrievalError, StorageError};

/// Top-level error taxonomy for the engine.
///
/// One variant per kind named in the error taxonomy; subsystem errors
/// convert in via `#[from]` rather than being re-derived ad hoc at call
/// sites, the same shape as the teacher's top-level error enum.
#[derive(Debug, thiserror::Error)]
pub enum NoemaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("contradiction rejected: {0}")]
    ContradictionRejected(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("deadline exceeded after {elapsed_ms}ms (budget {budget_ms}ms)")]
    DeadlineExceeded { elapsed_ms: u64, budget_ms: u64 },

    #[error("transient storage error: {0}")]
    TransientStorage(#[source] StorageError),

    #[error("permanent storage error: {0}")]
    PermanentStorage(#[source] StorageError),

    #[error("external collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("degraded: {0}")]
    Degraded(String),
}

impl From<StorageError> for NoemaError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            NoemaError::TransientStorage(err)
        } else {
            NoemaError::PermanentStorage(err)
        }
    }
}

impl From<EmbeddingError> for NoemaError {
    fn from(err: EmbeddingError) -> Self {
        NoemaError::ExternalUnavailable(err.to_string())
    }
}

impl From<RetrievalError> for NoemaError {
    fn from(err: RetrievalError) -> Self {
        NoemaError::Degraded(err.to_string())
    }
}

impl NoemaError {
    /// Exit-code-friendly classification for the (external) CLI boundary.
    /// This crate never exits a process itself; callers that do map through
    /// this accessor rather than matching on variants directly, so new
    /// kinds added here keep mapping correctly for them.
    pub fn exit_code(&self) -> u8 {
        match self {
            NoemaError::NotFound(_) => 4,
            NoemaError::InvariantViolation(_) => 5,
            NoemaError::ContradictionRejected(_) => 6,
            NoemaError::ValidationFailed(_) => 2,
            NoemaError::DeadlineExceeded { .. } => 7,
            NoemaError::TransientStorage(_) => 10,
            NoemaError::PermanentStorage(_) => 11,
            NoemaError::ExternalUnavailable(_) => 12,
            NoemaError::Degraded(_) => 1,
        }
    }

    /// Whether a caller should consider retrying the operation that
    /// produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NoemaError::TransientStorage(_) | NoemaError::ExternalUnavailable(_)
        )
    }
}

pub type NoemaResult<T> = Result<T, NoemaError>;
