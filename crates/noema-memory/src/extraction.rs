//! LLM-backed entity/relation extraction (§4.9 steps 5-6, §4.13 step 1).
//!
//! The extraction prompts ask for a strict JSON shape; a malformed or
//! non-JSON completion is treated as zero extractions rather than an error,
//! since the caller's extraction step is itself best-effort.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRelation {
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub confidence: f64,
    pub rationale: String,
}

pub fn entity_extraction_prompt(text: &str) -> String {
    format!(
        "Extract every named entity mentioned in the text below. \
         Respond with a JSON array only, each element shaped \
         {{\"name\": string, \"entity_type\": string}}.\n\nTEXT:\n{text}"
    )
}

pub fn relation_extraction_prompt(text: &str, entities: &[ExtractedEntity]) -> String {
    let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    format!(
        "Given the entities [{}] mentioned in the text below, extract every \
         relation between two of them. Respond with a JSON array only, each \
         element shaped {{\"from\": string, \"to\": string, \"relationship_type\": string, \
         \"confidence\": number in [0,1], \"rationale\": string}}. `from` and `to` \
         must be entity names from the list.\n\nTEXT:\n{text}",
        names.join(", ")
    )
}

/// Parses an entity-extraction completion. Logs and returns an empty vector
/// rather than failing the caller on malformed output.
pub fn parse_entities(raw: &str) -> Vec<ExtractedEntity> {
    match serde_json::from_str::<Vec<ExtractedEntity>>(raw) {
        Ok(entities) => entities,
        Err(e) => {
            tracing::warn!(error = %e, "entity extraction returned unparseable output");
            Vec::new()
        }
    }
}

pub fn parse_relations(raw: &str) -> Vec<ExtractedRelation> {
    match serde_json::from_str::<Vec<ExtractedRelation>>(raw) {
        Ok(relations) => relations,
        Err(e) => {
            tracing::warn!(error = %e, "relation extraction returned unparseable output");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_entity_array() {
        let raw = r#"[{"name":"Python","entity_type":"language"},{"name":"Guido","entity_type":"person"}]"#;
        let entities = parse_entities(raw);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "Python");
    }

    #[test]
    fn malformed_entity_output_yields_empty_vec_not_error() {
        let entities = parse_entities("not json at all");
        assert!(entities.is_empty());
    }

    #[test]
    fn parses_well_formed_relation_array() {
        let raw = r#"[{"from":"Guido","to":"Python","relationship_type":"CREATED","confidence":0.9,"rationale":"Guido van Rossum created the Python programming language in 1991."}]"#;
        let relations = parse_relations(raw);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relationship_type, "CREATED");
    }
}
