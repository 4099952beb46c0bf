/// Search and retrieval subsystem errors (C3, C7, C8).
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("view not ready: {view}")]
    ViewNotReady { view: String },

    #[error("unsupported search mode: {0}")]
    UnsupportedMode(String),

    #[error("fusion input mismatch: {0} ranked lists, expected at least 1")]
    FusionInputMismatch(usize),

    #[error("reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),
}
