//! Q&A Edge Generator (C13): turns validated question/thinking/answer
//! triples into graph edges between the entities they mention, with the
//! question/answer pair itself as rationale (§4.13).

use crate::extraction;
use noema_core::deadline::Deadline;
use noema_core::errors::NoemaResult;
use noema_core::traits::LlmClient;
use noema_graph::{CreateRelationshipOutcome, EntityStore, RelationshipStore};
use serde_json::{Map, Value};
use std::sync::Arc;

const QA_RELATIONSHIP_TYPE: &str = "qa_derived";

/// One already-validated question/thinking/answer triple. Generation and
/// corpus validation happen upstream; this module only derives edges from
/// triples that already passed validation (§4.13 Non-goals).
#[derive(Debug, Clone)]
pub struct QaPair {
    pub question: String,
    pub thinking: String,
    pub answer: String,
    pub question_type: String,
    /// The pair's own generation confidence, independent of corpus
    /// validation.
    pub confidence: f64,
    /// How strongly the corpus validation step confirmed this pair.
    pub validation_score: f64,
}

pub struct QaEdgeGeneratorResult {
    pub entity_count: usize,
    pub relationship_count: usize,
}

pub struct QaEdgeGenerator {
    entities: EntityStore,
    relationships: RelationshipStore,
    llm: Arc<dyn LlmClient>,
}

impl QaEdgeGenerator {
    pub fn new(entities: EntityStore, relationships: RelationshipStore, llm: Arc<dyn LlmClient>) -> Self {
        QaEdgeGenerator { entities, relationships, llm }
    }

    /// Runs the 3-step derivation for one Q&A pair (§4.13). Unlike the
    /// Memory Agent's extraction steps, this is not best-effort: the caller
    /// already chose to derive edges from this specific validated pair, so
    /// an LLM failure here is a real error.
    pub async fn generate(&self, pair: &QaPair, deadline: Deadline) -> NoemaResult<QaEdgeGeneratorResult> {
        deadline.check()?;
        let combined = format!("{}\n{}", pair.question, pair.answer);
        let prompt = extraction::entity_extraction_prompt(&combined);
        let raw = self.llm.complete(&prompt, &Default::default())?;
        let extracted = extraction::parse_entities(&raw);

        let mut entity_keys = Vec::with_capacity(extracted.len());
        for entity in &extracted {
            let key = self
                .entities
                .upsert_entity(entity.name.clone(), entity.entity_type.clone(), None, Map::new(), deadline)
                .await?;
            entity_keys.push(key);
        }

        let confidence = combine_confidence(pair.confidence, pair.validation_score);
        let rationale = format!("{} → {}", pair.question, pair.answer);
        let mut relationship_count = 0usize;
        for (i, from_key) in entity_keys.iter().enumerate() {
            for (j, to_key) in entity_keys.iter().enumerate() {
                if i == j {
                    continue;
                }
                let mut attributes = Map::new();
                attributes.insert("question_type".to_string(), Value::String(pair.question_type.clone()));
                attributes.insert(
                    "validation_score".to_string(),
                    serde_json::json!(pair.validation_score),
                );
                let outcome = self
                    .relationships
                    .create_relationship(
                        from_key.clone(),
                        to_key.clone(),
                        QA_RELATIONSHIP_TYPE.to_string(),
                        rationale.clone(),
                        attributes.into_iter().collect(),
                        confidence,
                        None,
                        None,
                        deadline,
                    )
                    .await?;
                if matches!(outcome, CreateRelationshipOutcome::Created(_)) {
                    relationship_count += 1;
                }
            }
        }

        Ok(QaEdgeGeneratorResult { entity_count: entity_keys.len(), relationship_count })
    }
}

/// Blends the pair's own generation confidence with how strongly corpus
/// validation confirmed it. Edges below 0.7 fall into `pending` review via
/// `RelationshipStore::create_relationship`'s existing confidence floor
/// (§4.5) — not reimplemented here.
fn combine_confidence(pair_confidence: f64, validation_score: f64) -> f64 {
    ((pair_confidence + validation_score) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_confidence_averages_and_clamps() {
        assert_eq!(combine_confidence(0.8, 0.6), 0.7);
        assert_eq!(combine_confidence(1.2, 1.0), 1.0);
        assert_eq!(combine_confidence(-0.5, 0.0), 0.0);
    }
}
