/// Embedding cache and embedder-adapter errors (C2).
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),

    #[error("embedder returned empty vector for input of length {len}")]
    EmptyVector { len: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cache poisoned: {0}")]
    CachePoisoned(String),
}
