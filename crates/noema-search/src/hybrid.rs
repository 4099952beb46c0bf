//! Hybrid search (C7): parallel BM25 + vector fetch, Reciprocal Rank Fusion,
//! and optional cross-encoder reranking.

use crate::methods::{bm25_search, vector_search, Bm25Params, VectorParams};
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult};
use noema_core::models::{Engine, FilterPredicate, RerankStrategy, SearchEnvelope, SearchHit};
use noema_core::traits::Reranker;
use noema_storage::pool::Pool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct HybridParams {
    pub view: String,
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub vector_collections: Vec<String>,
    pub filter: FilterPredicate,
    pub initial_k: usize,
    pub top_n: usize,
    pub expand_factor: usize,
    pub rrf_k0: f64,
}

/// `score(d) = Σ_m 1/(k₀ + rank_m(d))`, summed over every method that
/// returned `d`, ranks counted from 1 (§4.7).
pub async fn hybrid_search(pool: Arc<Pool>, params: HybridParams, deadline: Deadline) -> NoemaResult<SearchEnvelope> {
    let started = Instant::now();

    let bm25_params = Bm25Params {
        view: params.view.clone(),
        query: params.query.clone(),
        tag_list: params.filter.tag_list.clone(),
        min_score: None,
        top_n: params.initial_k,
    };
    let vector_params = VectorParams {
        collections: params.vector_collections.clone(),
        query_embedding: params.query_embedding.clone(),
        filter: FilterPredicate { min_score: None, ..params.filter.clone() },
        top_n: params.initial_k,
        expand_factor: params.expand_factor,
    };

    let (bm25_envelope, vector_envelope) = tokio::join!(
        bm25_search(pool.clone(), bm25_params, deadline),
        vector_search(pool.clone(), vector_params, deadline),
    );
    let bm25_envelope = bm25_envelope?;
    let vector_envelope = vector_envelope?;
    let truncated = bm25_envelope.truncated || vector_envelope.truncated;

    let fused = fuse(vec![bm25_envelope.results, vector_envelope.results], params.rrf_k0);
    let mut results: Vec<SearchHit> = fused.into_iter().take(params.top_n.max(1)).collect();
    results.truncate(params.top_n);
    let total = results.len();

    Ok(SearchEnvelope { results, total, time_ms: started.elapsed().as_millis() as u64, engine: Engine::Hybrid, truncated })
}

/// Deterministic given fixed input ranked lists (P7): RRF depends only on
/// rank order, never on the raw per-method scores.
fn fuse(ranked_lists: Vec<Vec<SearchHit>>, k0: f64) -> Vec<SearchHit> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut carrier: HashMap<String, SearchHit> = HashMap::new();
    for list in ranked_lists {
        for (idx, hit) in list.into_iter().enumerate() {
            let rank = idx + 1;
            let key = document_key(&hit);
            *scores.entry(key.clone()).or_insert(0.0) += 1.0 / (k0 + rank as f64);
            carrier.entry(key).or_insert(hit);
        }
    }
    let mut fused: Vec<SearchHit> = carrier
        .into_iter()
        .map(|(key, mut hit)| {
            hit.score = scores[&key];
            hit.engine = Engine::Hybrid;
            hit
        })
        .collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

/// Identifies "the same document" across independently-fetched hits by its
/// storage key rather than its full serialized content, so a mutable field
/// (e.g. a timestamp refreshed between fetches) can't split one document
/// into two fused results.
fn document_key(hit: &SearchHit) -> String {
    match hit.doc.key() {
        Some(key) => key.to_string(),
        None => serde_json::to_string(&hit.doc).unwrap_or_default(),
    }
}

/// Applies a cross-encoder rerank pass over the top `rerank_top_k` hits
/// (§4.7). `weighted` linearly mixes the reranker score with the fused
/// score using `weight`; `replace`/`max`/`min` as named.
pub fn apply_rerank(
    mut envelope: SearchEnvelope,
    reranker: &dyn Reranker,
    query: &str,
    strategy: RerankStrategy,
    rerank_top_k: usize,
    weight: f64,
) -> NoemaResult<SearchEnvelope> {
    let window = rerank_top_k.min(envelope.results.len());
    if window == 0 {
        return Ok(envelope);
    }
    let docs: Vec<String> = envelope.results[..window]
        .iter()
        .map(|h| serde_json::to_string(&h.doc).unwrap_or_default())
        .collect();
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    let rerank_scores = reranker
        .rerank(query, &doc_refs)
        .map_err(|e| NoemaError::Degraded(e.to_string()))?;

    for (hit, rerank_score) in envelope.results.iter_mut().take(window).zip(rerank_scores) {
        let rerank_score = rerank_score as f64;
        hit.score = match strategy {
            RerankStrategy::Replace => rerank_score,
            RerankStrategy::Weighted => weight * rerank_score + (1.0 - weight) * hit.score,
            RerankStrategy::Max => hit.score.max(rerank_score),
            RerankStrategy::Min => hit.score.min(rerank_score),
        };
    }
    envelope.results[..window].sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_core::models::Document;

    fn hit(content: &str, score: f64) -> SearchHit {
        SearchHit {
            doc: Document::Memory(noema_core::models::Memory {
                key: Some(content.to_string()),
                content: content.to_string(),
                summary: String::new(),
                embedding: Vec::new(),
                conversation_id: "c1".to_string(),
                episode_id: None,
                metadata: HashMap::new(),
                temporal: noema_core::models::TemporalStamp::new(chrono::Utc::now(), None),
            }),
            score,
            engine: Engine::Bm25,
            extras: HashMap::new(),
        }
    }

    #[test]
    fn rrf_matches_the_closed_form_for_a_doc_ranked_first_by_both_methods() {
        let fused = fuse(vec![vec![hit("a", 9.0)], vec![hit("a", 0.8)]], 60.0);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn rrf_sums_reciprocal_ranks_across_methods_for_a_doc_ranked_differently() {
        let fused = fuse(vec![vec![hit("a", 9.0), hit("b", 8.0)], vec![hit("b", 0.9), hit("a", 0.8)]], 60.0);
        assert_eq!(fused.len(), 2);
        let a = fused.iter().find(|h| h.doc.key() == Some("a")).unwrap();
        let b = fused.iter().find(|h| h.doc.key() == Some("b")).unwrap();
        assert!((a.score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-9);
        assert!((b.score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-9);
    }

    #[test]
    fn fusion_order_is_a_function_of_rank_not_raw_score() {
        let a = fuse(vec![vec![hit("x", 100.0), hit("y", 1.0)], vec![hit("y", 0.99)]], 60.0);
        let b = fuse(vec![vec![hit("x", 1.0), hit("y", 0.001)], vec![hit("y", 0.99)]], 60.0);
        let order_a: Vec<f64> = a.iter().map(|h| h.score).collect();
        let order_b: Vec<f64> = b.iter().map(|h| h.score).collect();
        assert_eq!(order_a, order_b);
    }
}
