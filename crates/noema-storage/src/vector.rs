/// Manual cosine similarity over L2-normalized vectors — the fallback path
/// documented as first-class in §4.2, and (since this backend has no true
/// approximate-nearest-neighbor operator) the implementation of Stage 1 of
/// the two-stage vector search itself. See `DESIGN.md` for why that
/// substitution is sound.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

/// Normalizes the raw `[-1, 1]` cosine score into `[0, 1]` before fusion
/// (§4.7).
pub fn normalize_score(raw: f32) -> f64 {
    ((raw as f64) + 1.0) / 2.0
}

pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
