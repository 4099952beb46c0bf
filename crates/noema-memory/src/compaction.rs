//! Compaction Engine (C12): rolls a conversation's message window into one
//! summary node, invalidating the sources at the compaction timestamp while
//! leaving point-in-time queries before that instant unaffected (§4.12).

use crate::monitoring::{self, CompactionAssessment, TunableThresholds};
use chrono::{DateTime, Utc};
use noema_core::config::CompactionConfig;
use noema_core::deadline::Deadline;
use noema_core::errors::{NoemaError, NoemaResult, StorageError};
use noema_core::models::{CompactionRecord, Message, TemporalStamp};
use noema_core::traits::LlmClient;
use noema_embeddings::cache::EmbeddingCache;
use noema_storage::pool::Pool;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct CompactionResult {
    pub compaction_key: String,
    pub source_keys: Vec<String>,
    pub compression_ratio: f64,
}

struct AutoTuneState {
    thresholds: TunableThresholds,
    recent: Vec<CompactionAssessment>,
}

pub struct CompactionEngine {
    pool: Arc<Pool>,
    embeddings: Arc<EmbeddingCache>,
    llm: Arc<dyn LlmClient>,
    config: CompactionConfig,
    auto_tune: Mutex<AutoTuneState>,
}

impl CompactionEngine {
    pub fn new(
        pool: Arc<Pool>,
        embeddings: Arc<EmbeddingCache>,
        llm: Arc<dyn LlmClient>,
        config: CompactionConfig,
        initial_window_messages: usize,
    ) -> Self {
        CompactionEngine {
            pool,
            embeddings,
            llm,
            config,
            auto_tune: Mutex::new(AutoTuneState {
                thresholds: TunableThresholds::new(initial_window_messages),
                recent: Vec::new(),
            }),
        }
    }

    /// Current window-size threshold, possibly raised by auto-tuning since
    /// construction (§11). Callers decide windows; this is advisory.
    pub fn window_threshold(&self) -> usize {
        self.auto_tune.lock().expect("auto-tune mutex poisoned").thresholds.window_messages
    }

    pub async fn compact(
        &self,
        conversation_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        deadline: Deadline,
    ) -> NoemaResult<CompactionResult> {
        deadline.check()?;
        let pool = self.pool.clone();
        let conv_id = conversation_id.to_string();
        let messages = tokio::task::spawn_blocking(move || {
            pool.with_read(|conn| fetch_window(conn, &conv_id, window_start, window_end))
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

        if messages.is_empty() {
            return Err(NoemaError::NotFound(format!(
                "no messages in conversation {conversation_id} within the given window"
            )));
        }

        let source_text: String = messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let source_len = source_text.chars().count();

        let summary = self
            .llm
            .complete(&summarization_prompt(&source_text), &Default::default())
            .map_err(|e| NoemaError::ExternalUnavailable(e.to_string()))?;
        let embedding = self.embeddings.embed(&summary)?;

        let compression_ratio = if source_len == 0 { 1.0 } else { summary.chars().count() as f64 / source_len as f64 };
        let met_floor = compression_ratio <= self.config.min_compression_ratio;

        let now = Utc::now();
        let source_keys: Vec<String> = messages.iter().filter_map(|m| m.key.clone()).collect();
        let compaction_key = uuid::Uuid::new_v4().to_string();
        let record = CompactionRecord {
            key: Some(compaction_key.clone()),
            conversation_id: conversation_id.to_string(),
            source_keys: source_keys.clone(),
            summary,
            embedding,
            temporal: TemporalStamp::new(now, None),
        };

        let pool = self.pool.clone();
        let keys_for_invalidation = source_keys.clone();
        let key_for_insert = compaction_key.clone();
        let compaction_key = tokio::task::spawn_blocking(move || {
            pool.with_write(|conn| {
                let key = insert_compaction(conn, record, key_for_insert)?;
                invalidate_messages(conn, &keys_for_invalidation, now, &key)?;
                Ok(key)
            })
        })
        .await
        .map_err(|e| StorageError::TransactionAborted(e.to_string()))??;

        if self.config.auto_tune {
            let mut state = self.auto_tune.lock().expect("auto-tune mutex poisoned");
            state.recent.push(CompactionAssessment { compression_ratio, met_floor });
            if state.recent.len() > self.config.tuning_interval as usize {
                state.recent.remove(0);
            }
            let recent = state.recent.clone();
            let adjustments = monitoring::maybe_tune(
                &mut state.thresholds,
                &recent,
                self.config.tuning_interval,
                self.config.tuning_raise_threshold,
            );
            for adjustment in adjustments {
                tracing::info!(
                    parameter = %adjustment.parameter,
                    old_value = adjustment.old_value,
                    new_value = adjustment.new_value,
                    reason = %adjustment.reason,
                    "compaction auto-tuner adjusted a threshold"
                );
            }
        }

        Ok(CompactionResult { compaction_key, source_keys, compression_ratio })
    }
}

fn summarization_prompt(source_text: &str) -> String {
    format!("Summarize the following conversation concisely, preserving any facts stated:\n\n{source_text}")
}

fn fetch_window(
    conn: &Connection,
    conversation_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<Message>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT doc FROM documents WHERE collection = 'messages' AND conversation_id = ?1 \
             AND invalid_at IS NULL AND created_at >= ?2 AND created_at <= ?3 ORDER BY created_at ASC",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(
            rusqlite::params![conversation_id, window_start.to_rfc3339(), window_end.to_rfc3339()],
            |row| row.get::<_, String>(0),
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let mut out = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        let message: Message = serde_json::from_str(&raw).map_err(|e| StorageError::SchemaMismatch(e.to_string()))?;
        out.push(message);
    }
    Ok(out)
}

fn insert_compaction(conn: &Connection, mut record: CompactionRecord, key: String) -> Result<String, StorageError> {
    record.key = Some(key.clone());
    conn.execute(
        "INSERT INTO documents (collection, key, doc, conversation_id, created_at, valid_at, invalid_at) \
         VALUES ('compactions', ?1, ?2, ?3, ?4, ?4, NULL)",
        rusqlite::params![
            key,
            serde_json::to_string(&record).unwrap_or_default(),
            record.conversation_id,
            record.temporal.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(key)
}

/// Invalidates the source messages at the compaction timestamp, mirroring
/// `invalid_at` and the superseding compaction key into the `doc` JSON
/// blob's `temporal.invalid_at`/`invalidated_by` alongside the indexed
/// column (§3). Search continues to find the compaction node; point-in-time
/// queries before `t_end` still see the originals (§4.12).
fn invalidate_messages(
    conn: &Connection,
    keys: &[String],
    t_end: DateTime<Utc>,
    superseded_by: &str,
) -> Result<(), StorageError> {
    for key in keys {
        conn.execute(
            "UPDATE documents SET invalid_at = ?1, \
             doc = json_set(json_set(doc, '$.temporal.invalid_at', ?1), '$.invalidated_by', ?2) \
             WHERE collection = 'messages' AND key = ?3",
            rusqlite::params![t_end.to_rfc3339(), superseded_by, key],
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}
