use noema_core::traits::ViewFieldConfig;

/// Normalizes a view's field configuration (sorted by field name, so
/// logically-equivalent configurations collide to the same hash regardless
/// of the order the caller listed fields in) and hashes it (§4.3).
pub fn normalized_hash(fields: &[ViewFieldConfig]) -> String {
    let mut sorted: Vec<&ViewFieldConfig> = fields.iter().collect();
    sorted.sort_by(|a, b| a.field.cmp(&b.field));
    let canonical = sorted
        .iter()
        .map(|f| format!("{}:{}", f.field, f.analyzer))
        .collect::<Vec<_>>()
        .join(",");
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, analyzer: &str) -> ViewFieldConfig {
        ViewFieldConfig {
            field: name.to_string(),
            analyzer: analyzer.to_string(),
        }
    }

    #[test]
    fn field_order_does_not_affect_hash() {
        let a = vec![field("content", "text_en"), field("summary", "text_en")];
        let b = vec![field("summary", "text_en"), field("content", "text_en")];
        assert_eq!(normalized_hash(&a), normalized_hash(&b));
    }

    #[test]
    fn different_analyzer_changes_hash() {
        let a = vec![field("content", "text_en")];
        let b = vec![field("content", "identity")];
        assert_ne!(normalized_hash(&a), normalized_hash(&b));
    }
}
