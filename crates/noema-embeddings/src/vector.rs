/// Normalizes an embedding to unit L2 length before it is cached or
/// persisted (§4.2). A zero vector is returned unchanged rather than
/// dividing by zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

pub fn is_unit_norm(v: &[f32], tolerance: f32) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() <= tolerance || v.iter().all(|x| *x == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        assert!(is_unit_norm(&v, 1e-5));
    }

    #[test]
    fn zero_vector_stays_zero() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
