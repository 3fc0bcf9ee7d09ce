//! Embedding capability consumed by the engine.
//!
//! The engine never talks to a model directly: it holds an
//! `Arc<dyn Embedder>` and tolerates every failure mode behind it. A memory
//! whose embedding could not be produced is stored without a vector, is
//! invisible to similarity search, and is repaired by the reconcile pass.
//!
//! Two implementations ship in-tree: [`HashEmbedder`], a deterministic
//! hashed bag-of-words fallback that needs no external model, and
//! [`CachedEmbedder`], a wrapper adding a bounded TTL cache in front of any
//! backend. Real model backends are supplied by the framing layer.

mod hash;

pub use hash::HashEmbedder;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheStats, LruCache};
use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{MemoryError, Result};

/// Maps text to a fixed-dimension unit-norm vector.
///
/// Implementations must be referentially transparent for the lifetime of a
/// process: the same text yields the same vector (modulo rounding).
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// The fixed output dimension.
    fn dimension(&self) -> usize;

    /// Embed one text. Fails with `EmbeddingUnavailable` when the backend
    /// is unreachable or the model has not loaded.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity between two vectors, squashed into `[0, 1]`.
///
/// Vectors that cannot be meaningfully compared (mismatched dimension,
/// empty, or all-zero) score 0.0 rather than erroring; callers treat such
/// records as simply not similar to anything. Negative cosine also maps
/// to 0.0 because the search layer only ranks on positive affinity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    // One pass accumulates the dot product and both squared norms.
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        (dot / denom).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}

/// Embedder wrapper that caches vectors by text.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: LruCache<String, Vec<f32>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner,
            cache: LruCache::new(capacity, ttl),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(&text.to_string()) {
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.put(text.to_string(), vector.clone());
        Ok(vector)
    }
}

/// An embedder that always fails, for the `none` backend.
///
/// Stores proceed without vectors and search degrades to tag matching.
pub struct DisabledEmbedder {
    dimension: usize,
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn name(&self) -> &str {
        "disabled"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::EmbeddingUnavailable(
            "embedding backend disabled by configuration".into(),
        ))
    }
}

/// Create the configured embedder, wrapped in the embedding cache.
pub fn create_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    let inner: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.dimension)),
        EmbeddingBackend::None => Arc::new(DisabledEmbedder {
            dimension: config.dimension,
        }),
    };
    Arc::new(CachedEmbedder::new(
        inner,
        config.cache_size,
        Some(Duration::from_secs(config.cache_ttl_secs)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0f32, 2.0, 3.0];
        let score = cosine_similarity(&v, &v);
        assert!(
            (score - 1.0).abs() < 1e-6,
            "Identical vectors should produce similarity 1.0, got {}",
            score
        );
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![0.0f32, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite_clamps_to_zero() {
        let a = vec![1.0f32, 0.0];
        let b = vec![-1.0f32, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-6);

        let mut zero = vec![0.0f32, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_cached_embedder_hits_cache() {
        let inner = Arc::new(HashEmbedder::new(64));
        let cached = CachedEmbedder::new(inner, 16, None);

        let first = cached.embed("hello world").await.unwrap();
        let second = cached.embed("hello world").await.unwrap();
        assert_eq!(first, second);
        let stats = cached.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_disabled_embedder_fails() {
        let embedder = DisabledEmbedder { dimension: 8 };
        let err = embedder.embed("anything").await.unwrap_err();
        assert_eq!(err.kind(), "embedding_unavailable");
    }

    #[test]
    fn test_create_embedder_respects_backend() {
        let mut config = EmbeddingConfig::default();
        config.backend = EmbeddingBackend::Hash;
        let embedder = create_embedder(&config);
        assert_eq!(embedder.name(), "hash");
        assert_eq!(embedder.dimension(), config.dimension);
    }
}
