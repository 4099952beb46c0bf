use crate::normalize::cache_key;
use crate::vector::l2_normalize;
use moka::sync::Cache;
use noema_core::config::EmbeddingConfig;
use noema_core::errors::{EmbeddingError, NoemaResult};
use noema_core::traits::Embedder;
use std::sync::Arc;

/// Process-local, bounded, LRU-evicting cache in front of an injected
/// [`Embedder`] (§4.2). The only mutable global-ish state this crate owns;
/// per §9 it is explicitly allowed to be process-global state as long as
/// it stays bounded and thread-safe, which `moka::sync::Cache` guarantees.
pub struct EmbeddingCache {
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(embedder: Arc<dyn Embedder>, config: &EmbeddingConfig) -> Self {
        EmbeddingCache {
            embedder,
            dimension: config.dimension,
            cache: Cache::new(config.cache_capacity),
        }
    }

    /// Returns the L2-normalized embedding for `text`, from cache if
    /// present. Validates dimension on every embedder call (I5).
    pub fn embed(&self, text: &str) -> NoemaResult<Vec<f32>> {
        let key = cache_key(self.embedder.model_id(), text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok((*hit).clone());
        }

        let raw = self
            .embedder
            .embed(text)
            .map_err(|e| noema_core::errors::NoemaError::ExternalUnavailable(e.to_string()))?;
        if raw.is_empty() {
            return Err(EmbeddingError::EmptyVector { len: text.len() }.into());
        }
        if raw.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: raw.len(),
            }
            .into());
        }

        let normalized = l2_normalize(&raw);
        self.cache.insert(key, Arc::new(normalized.clone()));
        Ok(normalized)
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        dim: usize,
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> NoemaResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut v = vec![0.0_f32; self.dim];
            v[0] = text.len() as f32 + 1.0;
            Ok(v)
        }

        fn model_id(&self) -> &str {
            "counting-test-model"
        }
    }

    fn config(dim: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            dimension: dim,
            ..Default::default()
        }
    }

    #[test]
    fn repeated_text_hits_cache_not_embedder() {
        let embedder = Arc::new(CountingEmbedder {
            dim: 4,
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(embedder.clone(), &config(4));

        cache.embed("hello world").unwrap();
        cache.embed("hello   world").unwrap();
        cache.embed("HELLO WORLD").unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn output_is_unit_normalized() {
        let embedder = Arc::new(CountingEmbedder {
            dim: 3,
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(embedder, &config(3));
        let v = cache.embed("abc").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let embedder = Arc::new(CountingEmbedder {
            dim: 4,
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(embedder, &config(8));
        assert!(cache.embed("mismatched").is_err());
    }
}
