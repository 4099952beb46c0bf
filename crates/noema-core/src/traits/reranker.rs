use crate::errors::NoemaResult;

/// Cross-encoder reranker boundary (§6). Scores are numeric but scale is
/// unspecified; the caller's `RerankStrategy` controls interpretation.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, docs: &[&str]) -> NoemaResult<Vec<f32>>;
}
