//! In-process vector index with scope-filtered cosine search.
//!
//! Brute-force exact search over unit-norm vectors: O(n·d) per query, which
//! is comfortably fast for the tens-of-thousands of memories a single
//! process serves. Records carry a scope tag so filtering happens during
//! the scan instead of post-hoc.
//!
//! ## Persistence
//!
//! Vectors are persisted to a sidecar JSON file (`vectors.json` under the
//! data directory) after every mutation, so previously indexed memories do
//! not need re-embedding on startup. Persistence failures are logged, not
//! propagated; the index stays consistent in memory and the metadata store
//! remains authoritative.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::embedding::cosine_similarity;
use crate::error::{MemoryError, Result};
use crate::scope::ScopeFilter;

/// One indexed record: the vector plus its scope tag and opaque aux data.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorRecord {
    vector: Vec<f32>,
    scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aux: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct VectorFile {
    records: HashMap<uuid::Uuid, VectorRecord>,
}

/// Exact cosine-similarity index keyed by memory id.
pub struct VectorIndex {
    records: RwLock<HashMap<uuid::Uuid, VectorRecord>>,
    path: PathBuf,
    dimension: usize,
}

impl VectorIndex {
    /// Open (or create) the index backed by `path`, expecting vectors of
    /// `dimension`. Records of a different dimension found on disk are
    /// dropped with a warning; they belong to a previous embedder.
    pub fn open(path: PathBuf, dimension: usize) -> Self {
        let mut loaded = load_vector_file(&path).records;
        let before = loaded.len();
        loaded.retain(|_, r| r.vector.len() == dimension);
        if loaded.len() < before {
            warn!(
                dropped = before - loaded.len(),
                dimension, "Dropped persisted vectors with stale dimension"
            );
        }
        Self {
            records: RwLock::new(loaded),
            path,
            dimension,
        }
    }

    /// Associate `id` with `vector` and a scope tag. Replaces any prior
    /// record for the id.
    pub async fn upsert(
        &self,
        id: uuid::Uuid,
        vector: Vec<f32>,
        scope: &str,
        aux: Option<serde_json::Value>,
    ) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemoryError::Internal(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        let mut records = self.records.write().await;
        records.insert(
            id,
            VectorRecord {
                vector,
                scope: scope.to_string(),
                aux,
            },
        );
        self.persist(&records);
        debug!(memory_id = %id, scope, "Vector upserted");
        Ok(())
    }

    /// Remove a record. Idempotent: absence is success.
    pub async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(&id).is_some() {
            self.persist(&records);
            debug!(memory_id = %id, "Vector deleted");
        }
        Ok(())
    }

    /// Top-k ids by cosine similarity, filtered by scope and `min_score`.
    ///
    /// Results are strictly ordered by score descending, ties broken by id
    /// ascending for determinism.
    pub async fn search(
        &self,
        query: &[f32],
        filter: &ScopeFilter,
        k: usize,
        min_score: f32,
    ) -> Vec<(uuid::Uuid, f32)> {
        let records = self.records.read().await;
        let mut hits: Vec<(uuid::Uuid, f32)> = records
            .iter()
            .filter(|(_, r)| filter.matches(&r.scope))
            .map(|(id, r)| (*id, cosine_similarity(query, &r.vector)))
            .filter(|(_, score)| *score >= min_score)
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }

    /// The stored vector for `id`, if any.
    pub async fn get_vector(&self, id: uuid::Uuid) -> Option<Vec<f32>> {
        self.records.read().await.get(&id).map(|r| r.vector.clone())
    }

    /// Rewrite the scope tag for an existing record. No-op when absent.
    pub async fn retag_scope(&self, id: uuid::Uuid, scope: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.scope = scope.to_string();
            self.persist(&records);
        }
        Ok(())
    }

    /// All ids currently indexed. Used by the reconcile pass.
    pub async fn ids(&self) -> Vec<uuid::Uuid> {
        self.records.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn persist(&self, records: &HashMap<uuid::Uuid, VectorRecord>) {
        let file = VectorFile {
            records: records.clone(),
        };
        save_vector_file(&self.path, &file);
    }
}

/// Load the vector file from disk, returning an empty store on any error.
fn load_vector_file(path: &Path) -> VectorFile {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Failed to parse vector index at {}: {}", path.display(), e);
            VectorFile::default()
        }),
        Err(_) => VectorFile::default(),
    }
}

/// Persist the vector file to disk.
///
/// Creates parent directories if they do not exist. Logs a warning on
/// failure rather than returning an error; the metadata store stays
/// authoritative and reconcile restores any lost vectors.
fn save_vector_file(path: &Path, file: &VectorFile) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create vector index directory: {}", e);
            return;
        }
    }
    match serde_json::to_string(file) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to write vector index to {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("Failed to serialize vector index: {}", e),
    }
}
