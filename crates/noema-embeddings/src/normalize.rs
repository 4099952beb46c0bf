/// Canonicalizes text before it becomes part of a cache key, so that
/// whitespace-only differences don't cause cache misses (§4.2: "a stable
/// hash of the normalized text plus the model identifier").
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Content-addressed cache key: `blake3(model_id || "\0" || normalized_text)`.
pub fn cache_key(model_id: &str, text: &str) -> String {
    let normalized = normalize_text(text);
    let mut input = Vec::with_capacity(model_id.len() + normalized.len() + 1);
    input.extend_from_slice(model_id.as_bytes());
    input.push(0);
    input.extend_from_slice(normalized.as_bytes());
    blake3::hash(&input).to_hex().to_string()
}
