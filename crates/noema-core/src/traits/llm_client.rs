use crate::errors::NoemaResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Black-box LLM call used for entity/relation extraction and rationale
/// generation (§6). Non-deterministic; failures are tolerated by the
/// memory agent (§7: ingestion continues, extraction is skipped).
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str, params: &LlmParams) -> NoemaResult<String>;
}
