mod embedder;
mod llm_client;
mod reranker;
mod storage_adapter;

pub use embedder::Embedder;
pub use llm_client::{LlmClient, LlmParams};
pub use reranker::Reranker;
pub use storage_adapter::{IndexMetric, StorageAdapter, ViewFieldConfig};
