//! Memory Agent (C9): the ingestion pipeline turning a user/agent turn into
//! stored messages, a summarizing Memory document, and best-effort graph
//! enrichment, plus a thin `search` facade over C7/C8.

use crate::extraction::{self, ExtractedEntity};
use chrono::{DateTime, Utc};
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaResult, StorageError};
use noema_core::models::{Memory, Message, QueryPreset, Role, SearchEnvelope, TemporalStamp};
use noema_core::traits::LlmClient;
use noema_embeddings::cache::EmbeddingCache;
use noema_graph::{EntityStore, RelationshipStore};
use noema_search::SearchEngine;
use noema_storage::pool::Pool;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct StoreConversationResult {
    pub conversation_id: String,
    pub user_key: String,
    pub agent_key: String,
    pub memory_key: String,
    pub entity_count: usize,
    pub relationship_count: usize,
}

pub struct StoreConversationParams {
    pub user_msg: String,
    pub agent_msg: String,
    pub conversation_id: Option<String>,
    pub episode_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub reference_time: Option<DateTime<Utc>>,
}

pub struct MemoryAgent {
    pool: Arc<Pool>,
    embeddings: Arc<EmbeddingCache>,
    entities: EntityStore,
    relationships: RelationshipStore,
    search: Arc<SearchEngine>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl MemoryAgent {
    pub fn new(
        pool: Arc<Pool>,
        embeddings: Arc<EmbeddingCache>,
        entities: EntityStore,
        relationships: RelationshipStore,
        search: Arc<SearchEngine>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        MemoryAgent { pool, embeddings, entities, relationships, search, llm }
    }

    /// §4.9's 8-step ingestion pipeline.
    pub async fn store_conversation(
        &self,
        params: StoreConversationParams,
        deadline: Deadline,
    ) -> NoemaResult<StoreConversationResult> {
        deadline.check()?;
        let conversation_id = params.conversation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = params.reference_time.unwrap_or_else(Utc::now);

        let user_embedding = self.embeddings.embed(&params.user_msg)?;
        let agent_embedding = self.embeddings.embed(&params.agent_msg)?;

        let pool = self.pool.clone();
        let conv_id = conversation_id.clone();
        let episode_id = params.episode_id.clone();
        let user_msg = params.user_msg.clone();
        let agent_msg = params.agent_msg.clone();
        let metadata = params.metadata.clone();
        let (user_key, agent_key, memory_key) = tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                let previous = last_message_key(conn, &conv_id)?;
                let user_key = insert_message(
                    conn,
                    Message {
                        key: None,
                        role: Role::User,
                        content: user_msg.clone(),
                        conversation_id: conv_id.clone(),
                        episode_id: episode_id.clone(),
                        embedding: user_embedding,
                        temporal: TemporalStamp::new(now, None),
                        previous_message_key: previous,
                    },
                )?;
                let agent_key = insert_message(
                    conn,
                    Message {
                        key: None,
                        role: Role::Agent,
                        content: agent_msg.clone(),
                        conversation_id: conv_id.clone(),
                        episode_id: episode_id.clone(),
                        embedding: agent_embedding,
                        temporal: TemporalStamp::new(now, None),
                        previous_message_key: Some(user_key.clone()),
                    },
                )?;
                let summary = summarize_pair(&user_msg, &agent_msg);
                let memory_key = insert_memory(
                    conn,
                    Memory {
                        key: None,
                        content: format!("{user_msg}\n{agent_msg}"),
                        summary,
                        embedding: blend_pair_embeddings(conn, &user_key, &agent_key)?,
                        conversation_id: conv_id.clone(),
                        episode_id: episode_id.clone(),
                        metadata: metadata.into_iter().collect(),
                        temporal: TemporalStamp::new(now, None),
                    },
                )?;
                Ok((user_key, agent_key, memory_key))
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

        let combined_text = format!("{}\n{}", params.user_msg, params.agent_msg);
        let (entity_count, extracted_entities) = self.extract_and_upsert_entities(&combined_text, deadline).await;
        let relationship_count =
            self.extract_and_link_relationships(&combined_text, extracted_entities, deadline).await;

        self.search.ensure_views().await?;

        Ok(StoreConversationResult {
            conversation_id,
            user_key,
            agent_key,
            memory_key,
            entity_count,
            relationship_count,
        })
    }

    /// Step 5: best-effort entity extraction. Returns `(upserted_count,
    /// extracted_entities)` so step 6 can reuse the entity name list without
    /// a second LLM round trip.
    async fn extract_and_upsert_entities(&self, text: &str, deadline: Deadline) -> (usize, Vec<ExtractedEntity>) {
        let Some(llm) = &self.llm else { return (0, Vec::new()) };
        let prompt = extraction::entity_extraction_prompt(text);
        let raw = match llm.complete(&prompt, &Default::default()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "entity extraction LLM call failed, continuing without entities");
                return (0, Vec::new());
            }
        };
        let entities = extraction::parse_entities(&raw);
        let mut upserted = 0usize;
        for entity in &entities {
            match self
                .entities
                .upsert_entity(entity.name.clone(), entity.entity_type.clone(), None, Map::new(), deadline)
                .await
            {
                Ok(_) => upserted += 1,
                Err(e) => tracing::warn!(error = %e, entity = %entity.name, "entity upsert failed, skipping"),
            }
        }
        (upserted, entities)
    }

    /// Step 6: best-effort relation extraction over the same entity set.
    async fn extract_and_link_relationships(
        &self,
        text: &str,
        entities: Vec<ExtractedEntity>,
        deadline: Deadline,
    ) -> usize {
        let Some(llm) = &self.llm else { return 0 };
        if entities.is_empty() {
            return 0;
        }
        let prompt = extraction::relation_extraction_prompt(text, &entities);
        let raw = match llm.complete(&prompt, &Default::default()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "relation extraction LLM call failed, continuing without relations");
                return 0;
            }
        };
        let relations = extraction::parse_relations(&raw);
        let entity_types: std::collections::HashMap<&str, &str> =
            entities.iter().map(|e| (e.name.as_str(), e.entity_type.as_str())).collect();
        let mut created = 0usize;
        for relation in relations {
            let from_key = match entity_types.get(relation.from.as_str()).copied() {
                Some(entity_type) => match self.entities.get_by_identity(&relation.from, entity_type, deadline).await {
                    Ok(Some(entity)) => entity.key,
                    _ => None,
                },
                None => None,
            };
            let to_key = match entity_types.get(relation.to.as_str()).copied() {
                Some(entity_type) => match self.entities.get_by_identity(&relation.to, entity_type, deadline).await {
                    Ok(Some(entity)) => entity.key,
                    _ => None,
                },
                None => None,
            };
            let (Some(from_key), Some(to_key)) = (from_key, to_key) else {
                tracing::warn!(from = %relation.from, to = %relation.to, "relation endpoints not resolvable, skipping");
                continue;
            };
            let outcome = self
                .relationships
                .create_relationship(
                    from_key,
                    to_key,
                    relation.relationship_type,
                    relation.rationale,
                    Default::default(),
                    relation.confidence,
                    None,
                    None,
                    deadline,
                )
                .await;
            match outcome {
                Ok(noema_graph::CreateRelationshipOutcome::Created(_)) => created += 1,
                Ok(noema_graph::CreateRelationshipOutcome::Rejected { reason }) => {
                    tracing::info!(reason = %reason, "relation rejected by contradiction engine");
                }
                Err(e) => tracing::warn!(error = %e, "relation creation failed, skipping"),
            }
        }
        created
    }

    /// `search(query, conversation_id?, n_results, point_in_time?)` (§4.9):
    /// routes via C8/C7, then applies the conversation/point-in-time
    /// Stage-2 filters the router's own presets don't know about.
    pub async fn search(
        &self,
        query: &str,
        query_embedding: Vec<f32>,
        conversation_id: Option<&str>,
        n_results: usize,
        point_in_time: Option<DateTime<Utc>>,
        deadline: Deadline,
    ) -> NoemaResult<SearchEnvelope> {
        let fetch_n = if conversation_id.is_some() || point_in_time.is_some() { n_results * 3 } else { n_results };
        let mut envelope = self
            .search
            .route(query, query_embedding, None::<QueryPreset>, None, fetch_n, deadline)
            .await?;
        if let Some(conversation_id) = conversation_id {
            envelope.results.retain(|hit| document_conversation_id(&hit.doc).as_deref() == Some(conversation_id));
        }
        if let Some(t) = point_in_time {
            envelope.results.retain(|hit| document_valid_at_instant(&hit.doc, t));
        }
        envelope.results.truncate(n_results);
        envelope.total = envelope.results.len();
        Ok(envelope)
    }
}

fn document_conversation_id(doc: &noema_core::models::Document) -> Option<String> {
    use noema_core::models::Document;
    match doc {
        Document::Message(m) => Some(m.conversation_id.clone()),
        Document::Memory(m) => Some(m.conversation_id.clone()),
        _ => None,
    }
}

fn document_valid_at_instant(doc: &noema_core::models::Document, t: DateTime<Utc>) -> bool {
    use noema_core::models::Document;
    match doc {
        Document::Message(m) => m.temporal.valid_at_instant(t),
        Document::Memory(m) => m.temporal.valid_at_instant(t),
        Document::Relationship(r) => r.temporal.valid_at_instant(t),
        Document::Compaction(c) => c.temporal.valid_at_instant(t),
        Document::Entity(_) => true,
    }
}

/// Deterministic, non-LLM summary of a turn: the pipeline's Memory
/// document needs *a* summary before the best-effort extraction steps even
/// run, so this can't depend on their success.
fn summarize_pair(user_msg: &str, agent_msg: &str) -> String {
    const MAX_LEN: usize = 240;
    let mut summary = format!("Q: {user_msg} A: {agent_msg}");
    if summary.chars().count() > MAX_LEN {
        summary = summary.chars().take(MAX_LEN).collect::<String>() + "...";
    }
    summary
}

fn last_message_key(conn: &Connection, conversation_id: &str) -> Result<Option<String>, StorageError> {
    conn.query_row(
        "SELECT key FROM documents WHERE collection = 'messages' AND conversation_id = ?1 \
         ORDER BY created_at DESC LIMIT 1",
        rusqlite::params![conversation_id],
        |row| row.get::<_, String>(0),
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError { message: other.to_string() }),
    })
}

fn insert_message(conn: &Connection, mut message: Message) -> Result<String, StorageError> {
    let key = uuid::Uuid::new_v4().to_string();
    message.key = Some(key.clone());
    conn.execute(
        "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
         VALUES ('messages', ?1, ?2, ?3, ?4, ?4, NULL)",
        rusqlite::params![
            key,
            serde_json::to_string(&message).unwrap_or_default(),
            message.conversation_id,
            message.temporal.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(key)
}

fn insert_memory(conn: &Connection, mut memory: Memory) -> Result<String, StorageError> {
    let key = uuid::Uuid::new_v4().to_string();
    memory.key = Some(key.clone());
    conn.execute(
        "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
         VALUES ('memories', ?1, ?2, ?3, ?4, ?4, NULL)",
        rusqlite::params![
            key,
            serde_json::to_string(&memory).unwrap_or_default(),
            memory.conversation_id,
            memory.temporal.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(key)
}

/// The Memory document's embedding is the mean of the two messages it
/// summarizes, re-fetched rather than threaded through as parameters since
/// both were just written in this same transaction.
fn blend_embeddings(a: &[f32], b: &[f32]) -> Vec<f32> {
    if a.len() != b.len() || a.is_empty() {
        return a.to_vec();
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x + y) / 2.0).collect()
}

fn blend_pair_embeddings(conn: &Connection, user_key: &str, agent_key: &str) -> Result<Vec<f32>, StorageError> {
    let user_doc = fetch_embedding(conn, user_key)?;
    let agent_doc = fetch_embedding(conn, agent_key)?;
    Ok(blend_embeddings(&user_doc, &agent_doc))
}

fn fetch_embedding(conn: &Connection, key: &str) -> Result<Vec<f32>, StorageError> {
    let raw: String = conn
        .query_row(
            "SELECT doc FROM documents WHERE collection = 'messages' AND key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
    Ok(doc
        .get("embedding")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
        .unwrap_or_default())
}
