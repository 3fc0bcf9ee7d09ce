//! Deterministic hashed bag-of-words embedder.
//!
//! Each lowercased alphanumeric token is hashed with SHA-256; the first
//! eight bytes select a bucket and the next byte a sign. Token counts are
//! accumulated into the bucket vector, dampened with `sqrt`, then
//! L2-normalized. Texts sharing vocabulary land near each other in cosine
//! space, which is enough for tests, offline use, and the duplicate check.
//! It is NOT a substitute for a learned model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::{l2_normalize, Embedder};

/// Hashed bag-of-words embedder. Referentially transparent by construction.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().expect("digest length"))
                as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        // Dampen heavy repetition so one frequent token cannot dominate.
        for x in vector.iter_mut() {
            *x = x.signum() * x.abs().sqrt();
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
