//! The Search Engine facade (C7): one entry point composing the view
//! manager, the six search methods, and the query router (C8).

use crate::document_fetch::{self, MEMORIES, MESSAGES, VERTEX_COLLECTIONS};
use crate::graph_traverse::{self, TraverseEnvelope, TraverseParams};
use crate::hybrid::{self, HybridParams};
use crate::methods::{self, Bm25Params, KeywordParams, TagParams, VectorParams};
use crate::router;
use chrono::{DateTime, Duration, Utc};
use noema_core::config::SearchConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::models::{Document, FilterPredicate, QueryPreset, RerankStrategy, SearchEnvelope, TagMode};
use noema_core::traits::{Reranker, ViewFieldConfig};
use noema_storage::pool::Pool;
use std::sync::Arc;

pub const LEXICAL_VIEW: &str = "primary_lexical";

pub struct SearchEngine {
    pool: Arc<Pool>,
    config: SearchConfig,
    view_manager: crate::ViewManager,
}

impl SearchEngine {
    pub fn new(pool: Arc<Pool>, config: SearchConfig) -> Self {
        let view_manager = crate::ViewManager::new(pool.clone());
        SearchEngine { pool, config, view_manager }
    }

    /// Creates (or, under `CheckConfig`, reuses) the lexical view spanning
    /// both message-bearing collections. Returns whether it was rebuilt.
    pub async fn ensure_views(&self) -> NoemaResult<bool> {
        let fields = vec![
            ViewFieldConfig { field: "content".to_string(), analyzer: "text_en".to_string() },
            ViewFieldConfig { field: "summary".to_string(), analyzer: "text_en".to_string() },
        ];
        let created = self
            .view_manager
            .ensure_view(LEXICAL_VIEW, MEMORIES, fields.clone(), self.config.view_policy)
            .await?;
        if created {
            self.view_manager.add_linked_collection(LEXICAL_VIEW, MESSAGES, fields).await?;
        }
        Ok(created)
    }

    pub async fn bm25(
        &self,
        query: &str,
        tag_list: Option<Vec<String>>,
        min_score: Option<f64>,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        methods::bm25_search(
            self.pool.clone(),
            Bm25Params { view: LEXICAL_VIEW.to_string(), query: query.to_string(), tag_list, min_score, top_n },
            deadline,
        )
        .await
    }

    pub async fn vector(
        &self,
        query_embedding: Vec<f32>,
        filter: FilterPredicate,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        methods::vector_search(
            self.pool.clone(),
            VectorParams {
                collections: VERTEX_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
                query_embedding,
                filter,
                top_n,
                expand_factor: self.config.expand_factor,
            },
            deadline,
        )
        .await
    }

    pub async fn tag(
        &self,
        tags: Vec<String>,
        mode: TagMode,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        methods::tag_search(
            self.pool.clone(),
            TagParams { collections: VERTEX_COLLECTIONS.iter().map(|s| s.to_string()).collect(), tags, mode, top_n },
            deadline,
        )
        .await
    }

    pub async fn keyword(
        &self,
        field: &str,
        query: &str,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        methods::keyword_search(
            self.pool.clone(),
            KeywordParams {
                collections: VERTEX_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
                field: field.to_string(),
                query: query.to_string(),
                top_n,
            },
            deadline,
        )
        .await
    }

    pub async fn graph_traverse(
        &self,
        seed: &str,
        max_depth: usize,
        directed: bool,
        edge_filter: Option<String>,
        deadline: Deadline,
    ) -> NoemaResult<TraverseEnvelope> {
        graph_traverse::traverse(
            self.pool.clone(),
            TraverseParams {
                seed: seed.to_string(),
                collection: document_fetch::RELATIONSHIPS.to_string(),
                max_depth,
                directed,
                edge_filter,
            },
            deadline,
        )
        .await
    }

    pub async fn hybrid(
        &self,
        query: &str,
        query_embedding: Vec<f32>,
        filter: FilterPredicate,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        hybrid::hybrid_search(
            self.pool.clone(),
            HybridParams {
                view: LEXICAL_VIEW.to_string(),
                query: query.to_string(),
                query_embedding,
                vector_collections: VERTEX_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
                filter,
                initial_k: self.config.initial_k,
                top_n,
                expand_factor: self.config.expand_factor,
                rrf_k0: self.config.rrf_k0,
            },
            deadline,
        )
        .await
    }

    /// Classifies `query` and dispatches to the matching method (§4.8).
    ///
    /// GRAPH_EXPLORATION has no seed vertex when reached through a raw text
    /// query (the router table names a method, not an entity) — lacking one,
    /// this falls back to Hybrid. A caller that already has a seed should
    /// call [`Self::graph_traverse`] directly instead of routing.
    pub async fn route(
        &self,
        query: &str,
        query_embedding: Vec<f32>,
        preset_override: Option<QueryPreset>,
        reranker: Option<&dyn Reranker>,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        let preset = router::classify(query, preset_override);
        let filter = FilterPredicate::default();

        let envelope = match preset {
            QueryPreset::TagBased => {
                let tags = extract_inline_tags(query);
                self.tag(tags, TagMode::Intersection, top_n, deadline).await?
            }
            QueryPreset::GraphExploration => {
                self.hybrid(query, query_embedding, filter, top_n, deadline).await?
            }
            QueryPreset::Factual => {
                let envelope = self.bm25(query, None, None, self.config.rerank_top_k.max(top_n), deadline).await?;
                rerank_if_available(envelope, reranker, query, self.config.rerank_strategy, self.config.rerank_top_k, self.config.rerank_weight, top_n)?
            }
            QueryPreset::Conceptual => {
                let envelope = self
                    .vector(query_embedding, filter, self.config.rerank_top_k.max(top_n), deadline)
                    .await?;
                rerank_if_available(envelope, reranker, query, self.config.rerank_strategy, self.config.rerank_top_k, self.config.rerank_weight, top_n)?
            }
            QueryPreset::RecentContext => {
                let cutoff = Utc::now() - Duration::days(self.config.recent_context_window_days);
                let envelope = self.hybrid(query, query_embedding, filter, top_n * 3, deadline).await?;
                restrict_to_window(envelope, cutoff, top_n)
            }
            QueryPreset::Exploratory => self.hybrid(query, query_embedding, filter, top_n, deadline).await?,
        };
        Ok(envelope)
    }
}

fn extract_inline_tags(query: &str) -> Vec<String> {
    let trimmed = query.trim();
    if let Some(rest) = trimmed.strip_prefix("tag:") {
        return vec![rest.trim().to_string()];
    }
    trimmed
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('#'))
        .map(str::to_string)
        .collect()
}

fn rerank_if_available(
    envelope: SearchEnvelope,
    reranker: Option<&dyn Reranker>,
    query: &str,
    strategy: RerankStrategy,
    rerank_top_k: usize,
    weight: f64,
    top_n: usize,
) -> NoemaResult<SearchEnvelope> {
    let mut envelope = match reranker {
        Some(reranker) => hybrid::apply_rerank(envelope, reranker, query, strategy, rerank_top_k, weight)?,
        None => envelope,
    };
    envelope.results.truncate(top_n);
    envelope.total = envelope.results.len();
    Ok(envelope)
}

fn restrict_to_window(mut envelope: SearchEnvelope, cutoff: DateTime<Utc>, top_n: usize) -> SearchEnvelope {
    envelope.results.retain(|hit| document_valid_at(&hit.doc).map(|t| t >= cutoff).unwrap_or(true));
    envelope.results.truncate(top_n);
    envelope.total = envelope.results.len();
    envelope
}

fn document_valid_at(doc: &Document) -> Option<DateTime<Utc>> {
    match doc {
        Document::Message(m) => Some(m.temporal.valid_at),
        Document::Memory(m) => Some(m.temporal.valid_at),
        Document::Entity(_) => None,
        Document::Relationship(r) => Some(r.temporal.valid_at),
        Document::Compaction(c) => Some(c.temporal.valid_at),
    }
}
