//! Durable metadata store: the authoritative record of every memory.
//!
//! Backed by a JSON file under the data directory. Unlike the vector index
//! and the graph, writes here MUST reach disk before an operation reports
//! success; a failed flush fails the write. When stores disagree, this one
//! wins and reconcile repairs the others.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::model::Memory;
use crate::scope::ScopeFilter;

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct MetadataFile {
    memories: HashMap<uuid::Uuid, Memory>,
}

/// Record-oriented store keyed by memory id.
pub struct MetadataStore {
    memories: RwLock<HashMap<uuid::Uuid, Memory>>,
    path: PathBuf,
}

impl MetadataStore {
    /// Open (or create) the store backed by `path`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let memories = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: MetadataFile = serde_json::from_str(&raw)?;
            file.memories
        } else {
            HashMap::new()
        };
        Ok(Self {
            memories: RwLock::new(memories),
            path,
        })
    }

    /// Insert a new record. Fails if the flush to disk fails.
    pub async fn put(&self, memory: Memory) -> Result<()> {
        let mut memories = self.memories.write().await;
        memories.insert(memory.id, memory);
        self.flush(&memories)
    }

    pub async fn get(&self, id: uuid::Uuid) -> Option<Memory> {
        self.memories.read().await.get(&id).cloned()
    }

    /// Replace an existing record. `NotFound` when the id is absent.
    pub async fn update(&self, memory: Memory) -> Result<()> {
        let mut memories = self.memories.write().await;
        if !memories.contains_key(&memory.id) {
            return Err(MemoryError::NotFound(memory.id));
        }
        memories.insert(memory.id, memory);
        self.flush(&memories)
    }

    /// Remove a record. `NotFound` when the id is absent.
    pub async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        let mut memories = self.memories.write().await;
        if memories.remove(&id).is_none() {
            return Err(MemoryError::NotFound(id));
        }
        self.flush(&memories)
    }

    /// List records matching `filter`, ordered by `created_at` descending
    /// (id ascending on ties), with offset/limit pagination.
    pub async fn list(&self, filter: &ScopeFilter, limit: usize, offset: usize) -> Vec<Memory> {
        let memories = self.memories.read().await;
        let mut matched: Vec<&Memory> = memories
            .values()
            .filter(|m| filter.matches(&m.scope))
            .collect();
        sort_newest_first(&mut matched);
        matched.into_iter().skip(offset).take(limit).cloned().collect()
    }

    /// Count records matching `filter`.
    pub async fn count(&self, filter: &ScopeFilter) -> usize {
        self.memories
            .read()
            .await
            .values()
            .filter(|m| filter.matches(&m.scope))
            .count()
    }

    /// The distinct scopes currently in use, sorted.
    pub async fn list_scopes(&self) -> Vec<String> {
        let memories = self.memories.read().await;
        let scopes: BTreeSet<String> = memories.values().map(|m| m.scope.clone()).collect();
        scopes.into_iter().collect()
    }

    /// Tag search. `match_all` requires every queried tag to be present;
    /// otherwise any overlap matches. Results ordered newest first.
    pub async fn search_by_tags(
        &self,
        tags: &[String],
        filter: &ScopeFilter,
        match_all: bool,
        limit: usize,
    ) -> Vec<Memory> {
        if tags.is_empty() {
            return Vec::new();
        }
        let memories = self.memories.read().await;
        let mut matched: Vec<&Memory> = memories
            .values()
            .filter(|m| filter.matches(&m.scope))
            .filter(|m| {
                if match_all {
                    tags.iter().all(|t| m.tags.contains(t))
                } else {
                    tags.iter().any(|t| m.tags.contains(t))
                }
            })
            .collect();
        sort_newest_first(&mut matched);
        matched.into_iter().take(limit).cloned().collect()
    }

    /// Records created within `[start, end]`, newest first.
    pub async fn search_by_timerange(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &ScopeFilter,
        limit: usize,
    ) -> Vec<Memory> {
        let memories = self.memories.read().await;
        let mut matched: Vec<&Memory> = memories
            .values()
            .filter(|m| filter.matches(&m.scope))
            .filter(|m| m.created_at >= start && m.created_at <= end)
            .collect();
        sort_newest_first(&mut matched);
        matched.into_iter().take(limit).cloned().collect()
    }

    /// Case-insensitive substring search over content, newest first.
    ///
    /// Degraded-path search used when the embedding backend is down.
    pub async fn full_text_search(
        &self,
        text: &str,
        filter: &ScopeFilter,
        limit: usize,
    ) -> Vec<Memory> {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let memories = self.memories.read().await;
        let mut matched: Vec<&Memory> = memories
            .values()
            .filter(|m| filter.matches(&m.scope))
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .collect();
        sort_newest_first(&mut matched);
        matched.into_iter().take(limit).cloned().collect()
    }

    /// Bump `access_count` and `accessed_at` for a successful read.
    ///
    /// Access bookkeeping is not worth failing a read over, so flush errors
    /// are swallowed after the in-memory update.
    pub async fn record_access(&self, id: uuid::Uuid) -> Result<()> {
        let mut memories = self.memories.write().await;
        let memory = memories.get_mut(&id).ok_or(MemoryError::NotFound(id))?;
        memory.access_count += 1;
        memory.accessed_at = Utc::now();
        let _ = self.flush(&memories);
        Ok(())
    }

    /// All ids currently stored. Used by the reconcile pass.
    pub async fn ids(&self) -> Vec<uuid::Uuid> {
        self.memories.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.memories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memories.read().await.is_empty()
    }

    pub async fn contains(&self, id: uuid::Uuid) -> bool {
        self.memories.read().await.contains_key(&id)
    }

    fn flush(&self, memories: &HashMap<uuid::Uuid, Memory>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = MetadataFile {
            memories: memories.clone(),
        };
        let json = serde_json::to_string(&file)?;
        write_atomic(&self.path, &json)?;
        debug!(count = memories.len(), "Metadata store flushed");
        Ok(())
    }
}

/// Write via a sibling temp file + rename so a crash mid-write never leaves
/// a truncated store behind.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn sort_newest_first(memories: &mut [&Memory]) {
    memories.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
