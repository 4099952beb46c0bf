//! The facade crate: wires storage, embeddings, graph, search, and
//! ingestion into one `Engine`, matching one exported method per §4
//! operation (§6: "roughly one function per method described above").

use std::sync::Arc;

use chrono::{DateTime, Utc};
use noema_core::config::NoemaConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::models::{
    CloseOutcome, Community, ContradictionSummary, Episode, Memory, QueryPreset, SearchEnvelope,
};
use noema_core::traits::{Embedder, LlmClient, Reranker};
use noema_embeddings::cache::EmbeddingCache;
use noema_graph::{CommunityDetector, ContradictionEngine, CreateRelationshipOutcome, EntityStore, RelationshipStore};
use noema_memory::compaction::{CompactionEngine, CompactionResult};
use noema_memory::qa_edge_generator::{QaEdgeGenerator, QaEdgeGeneratorResult, QaPair};
use noema_memory::{EpisodeManager, MemoryAgent, StoreConversationParams, StoreConversationResult};
use noema_search::SearchEngine;
use noema_storage::StorageEngine;
use std::collections::HashMap;

pub use noema_core::errors::NoemaError;

/// Initializes a global `tracing` subscriber from `RUST_LOG` (env-filter),
/// JSON-formatted. Optional: callers embedding this crate in a larger
/// process may install their own subscriber instead.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();
}

/// The assembled engine: one instance per process (or per tenant, if the
/// caller wants isolation), holding the single-writer storage pool and
/// every subsystem built atop it.
pub struct Engine {
    storage: StorageEngine,
    search: Arc<SearchEngine>,
    relationships: RelationshipStore,
    memory_agent: MemoryAgent,
    episodes: EpisodeManager,
    compaction: Option<CompactionEngine>,
    qa_edges: Option<QaEdgeGenerator>,
    communities: CommunityDetector,
    contradictions: ContradictionEngine,
}

impl Engine {
    /// Assembles every subsystem from one `NoemaConfig` plus the two
    /// black-box collaborators the core never implements itself (§6): the
    /// embedder and, optionally, the LLM. Without an LLM, ingestion still
    /// works (entity/relation extraction degrades to a no-op per §4.9) but
    /// compaction (C12) and Q&A edge generation (C13) are unavailable,
    /// since both require it for a non-best-effort step.
    pub fn init(config: NoemaConfig, embedder: Arc<dyn Embedder>, llm: Option<Arc<dyn LlmClient>>) -> anyhow::Result<Self> {
        let storage = if config.storage.database_path == ":memory:" {
            StorageEngine::open_in_memory()
        } else {
            StorageEngine::open(&config.storage.database_path)
        }
        .map_err(|e| anyhow::anyhow!("failed to open storage: {e}"))?;

        let pool = storage.pool().clone();
        let embeddings = Arc::new(EmbeddingCache::new(embedder, &config.embedding));
        let relationships_for_agent = RelationshipStore::new(pool.clone(), config.graph.clone());
        let relationships = RelationshipStore::new(pool.clone(), config.graph.clone());
        let search = Arc::new(SearchEngine::new(pool.clone(), config.search.clone()));

        let memory_agent = MemoryAgent::new(
            pool.clone(),
            embeddings.clone(),
            EntityStore::new(pool.clone(), config.graph.clone()),
            relationships_for_agent,
            search.clone(),
            llm.clone(),
        );
        let episodes = EpisodeManager::new(pool.clone());
        let compaction = llm.clone().map(|llm| {
            CompactionEngine::new(pool.clone(), embeddings, llm, config.compaction.clone(), 20)
        });
        let qa_edges = llm.map(|llm| {
            QaEdgeGenerator::new(
                EntityStore::new(pool.clone(), config.graph.clone()),
                RelationshipStore::new(pool.clone(), config.graph.clone()),
                llm,
            )
        });
        let communities = CommunityDetector::new(pool.clone(), config.graph.clone());
        let contradictions = ContradictionEngine::new(pool.clone());

        Ok(Engine { storage, search, relationships, memory_agent, episodes, compaction, qa_edges, communities, contradictions })
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// C9: the 8-step ingestion pipeline.
    pub async fn store_conversation(
        &self,
        params: StoreConversationParams,
        deadline: Deadline,
    ) -> NoemaResult<StoreConversationResult> {
        self.memory_agent.store_conversation(params, deadline).await
    }

    /// C7/C8 via C9's Stage-2 filtering facade.
    pub async fn search(
        &self,
        query: &str,
        query_embedding: Vec<f32>,
        conversation_id: Option<&str>,
        n_results: usize,
        point_in_time: Option<DateTime<Utc>>,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        self.memory_agent.search(query, query_embedding, conversation_id, n_results, point_in_time, deadline).await
    }

    /// C8's raw router, for callers that want preset/reranker control C9's
    /// facade doesn't expose.
    pub async fn route(
        &self,
        query: &str,
        query_embedding: Vec<f32>,
        preset_override: Option<QueryPreset>,
        reranker: Option<&dyn Reranker>,
        top_n: usize,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        self.search.route(query, query_embedding, preset_override, reranker, top_n, deadline).await
    }

    /// C10.
    pub async fn open_episode(&self, title: String, event_type: String, deadline: Deadline) -> NoemaResult<String> {
        self.episodes.open(title, event_type, deadline).await
    }

    pub async fn get_episode(&self, key: &str, deadline: Deadline) -> NoemaResult<Option<Episode>> {
        self.episodes.get(key, deadline).await
    }

    pub async fn current_episode(&self, deadline: Deadline) -> NoemaResult<Option<Episode>> {
        self.episodes.current(deadline).await
    }

    pub async fn close_episode(&self, key: &str, deadline: Deadline) -> NoemaResult<CloseOutcome> {
        self.episodes.close(key, deadline).await
    }

    pub async fn episode_conversations(&self, episode_id: &str, deadline: Deadline) -> NoemaResult<Vec<Memory>> {
        self.episodes.conversations(episode_id, deadline).await
    }

    /// C12. `Err` via `anyhow`-free `NoemaError::Degraded` if the engine was
    /// assembled without an LLM collaborator.
    pub async fn compact(
        &self,
        conversation_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        deadline: Deadline,
    ) -> NoemaResult<CompactionResult> {
        let engine = self
            .compaction
            .as_ref()
            .ok_or_else(|| NoemaError::Degraded("compaction requires an LLM collaborator".to_string()))?;
        engine.compact(conversation_id, window_start, window_end, deadline).await
    }

    /// C13. `None` if the engine was assembled without an LLM collaborator.
    pub async fn generate_qa_edges(&self, pair: &QaPair, deadline: Deadline) -> Option<NoemaResult<QaEdgeGeneratorResult>> {
        match &self.qa_edges {
            Some(generator) => Some(generator.generate(pair, deadline).await),
            None => None,
        }
    }

    /// C11.
    pub async fn detect_communities(&self, deadline: Deadline) -> NoemaResult<Vec<Community>> {
        self.communities.detect_and_persist(deadline).await
    }

    /// C6's audit trail.
    pub async fn contradiction_log(&self) -> NoemaResult<ContradictionSummary> {
        self.contradictions.summary().await.map_err(NoemaError::from)
    }

    /// C6's direct edge-creation entry point, for callers that already
    /// have resolved entity keys (bypassing C9's extraction pipeline).
    pub async fn create_relationship(
        &self,
        from: String,
        to: String,
        relationship_type: String,
        rationale: String,
        attributes: HashMap<String, serde_json::Value>,
        confidence: f64,
        valid_at: Option<DateTime<Utc>>,
        deadline: Deadline,
    ) -> NoemaResult<CreateRelationshipOutcome> {
        self.relationships
            .create_relationship(from, to, relationship_type, rationale, attributes, confidence, valid_at, None, deadline)
            .await
    }
}
