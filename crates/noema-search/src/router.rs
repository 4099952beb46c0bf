//! Search Config Router (C8): classifies a raw query string into a
//! [`QueryPreset`], deterministically and in cue-table order (§4.8).

use noema_core::models::QueryPreset;

const GRAPH_CUES: &[&str] = &["related", "connected", "linked", "graph"];
const FACTUAL_PREFIXES: &[&str] = &["what", "when", "where", "how many", "how much"];
const CONCEPTUAL_CUES: &[&str] = &["why", "explain", "understand", "theory"];
const RECENT_CUES: &[&str] = &["recent", "latest", "today", "yesterday", "last"];

/// Classifies `query` into a preset, trying cue-table rows top-to-bottom.
/// `explicit_override` short-circuits classification entirely when the
/// caller already knows which preset it wants.
pub fn classify(query: &str, explicit_override: Option<QueryPreset>) -> QueryPreset {
    if let Some(preset) = explicit_override {
        return preset;
    }
    let lower = query.to_lowercase();
    let trimmed = lower.trim_start();

    if trimmed.starts_with("tag:") || lower.contains('#') {
        return QueryPreset::TagBased;
    }
    if GRAPH_CUES.iter().any(|cue| lower.contains(cue)) {
        return QueryPreset::GraphExploration;
    }
    if FACTUAL_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix)) {
        return QueryPreset::Factual;
    }
    if CONCEPTUAL_CUES.iter().any(|cue| lower.contains(cue)) {
        return QueryPreset::Conceptual;
    }
    if RECENT_CUES.iter().any(|cue| lower.contains(cue)) {
        return QueryPreset::RecentContext;
    }
    QueryPreset::Exploratory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_named_scenario_query() {
        assert_eq!(classify("What is Python?", None), QueryPreset::Factual);
        assert_eq!(classify("Why is recursion important?", None), QueryPreset::Conceptual);
        assert_eq!(classify("tag:python", None), QueryPreset::TagBased);
        assert_eq!(classify("show me recent updates", None), QueryPreset::RecentContext);
    }

    #[test]
    fn hash_cue_routes_to_tag_based() {
        assert_eq!(classify("notes about #rust", None), QueryPreset::TagBased);
    }

    #[test]
    fn graph_cue_takes_priority_over_a_later_matching_row() {
        // Contains both a graph cue and a recency cue; graph is tried first.
        assert_eq!(classify("show me things connected to it recently", None), QueryPreset::GraphExploration);
    }

    #[test]
    fn anything_unmatched_falls_back_to_exploratory() {
        assert_eq!(classify("tell me a story", None), QueryPreset::Exploratory);
    }

    #[test]
    fn explicit_override_bypasses_classification() {
        assert_eq!(classify("what time is it", Some(QueryPreset::Exploratory)), QueryPreset::Exploratory);
    }
}
