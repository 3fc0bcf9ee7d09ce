//! Memory engine: coordinates the embedder and the storage trio.
//!
//! All mutations flow through here. Writes fan out to the vector index,
//! metadata store, and association graph in parallel; the metadata store is
//! the success gate (its failure fails the operation and triggers
//! best-effort rollback of the other two, which are idempotent deletes).
//! Secondary-store failures degrade: the write succeeds, the record is
//! flagged, and the background reconcile pass repairs it.
//!
//! Writes to the same memory id are serialized through a per-id lock
//! registry; operations on different ids run concurrently. A semaphore
//! bounds concurrent operations; when it is exhausted the engine refuses
//! with `Overloaded` instead of queueing unboundedly.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::LruCache;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{MemoryError, Result};
use crate::model::{normalize_tags, Association, Direction, Memory, ScoredMemory};
use crate::scope::{self, ScopeFilter};
use crate::storage::{AssociationGraph, MetadataStore, VectorIndex};

/// Metadata flag set when a record has no vector (embedding failed or the
/// secondary upsert did). Cleared by reconcile once repaired.
const EMBEDDING_MISSING_FLAG: &str = "embedding_missing";

/// Inputs for a store operation.
#[derive(Debug, Clone)]
pub struct StoreParams {
    pub content: String,
    pub scope: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub allow_duplicates: bool,
    /// Cosine threshold for duplicate suppression; engine default when None.
    pub duplicate_threshold: Option<f32>,
}

/// Outcome of a store operation.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub memory: Memory,
    /// Set when duplicate suppression returned an existing record.
    pub duplicate_of: Option<Uuid>,
    pub has_embedding: bool,
    /// A secondary store failed; reconcile will repair.
    pub partial_write: bool,
}

/// Field-by-field update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct UpdateParams {
    pub content: Option<String>,
    pub scope: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Option<String>>,
    /// Merged into the existing metadata map.
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    pub preserve_associations: bool,
}

/// Per-id outcome of a batch move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub moved: Vec<Memory>,
    pub failed_ids: Vec<Uuid>,
}

/// What a reconcile pass repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub vectors_restored: usize,
    pub vectors_unrepairable: usize,
    pub orphan_vectors_removed: usize,
    pub dangling_edges_removed: usize,
}

/// Aggregate engine statistics.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub total_memories: usize,
    pub total_vectors: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub distinct_scopes: usize,
    pub memory_cache: crate::cache::CacheStats,
}

/// The coordinator that owns the embedder and the three stores.
pub struct MemoryEngine {
    embedder: Arc<dyn Embedder>,
    vector: Arc<VectorIndex>,
    metadata: Arc<MetadataStore>,
    graph: Arc<AssociationGraph>,
    config: Config,
    memory_cache: LruCache<Uuid, Memory>,
    id_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    limiter: Arc<Semaphore>,
}

impl MemoryEngine {
    /// Build an engine over the data directory named in `config`.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let data_dir = &config.storage.data_dir;
        let vector = Arc::new(VectorIndex::open(
            data_dir.join("vectors.json"),
            embedder.dimension(),
        ));
        let metadata = Arc::new(MetadataStore::open(data_dir.join("memories.json"))?);
        let graph = Arc::new(AssociationGraph::open(
            data_dir.join("graph.json"),
            config.storage.graph_flush_every,
        ));
        let memory_cache = LruCache::new(config.engine.memory_cache_size, None);
        let limiter = Arc::new(Semaphore::new(config.engine.max_concurrent_ops));
        Ok(Self {
            embedder,
            vector,
            metadata,
            graph,
            config,
            memory_cache,
            id_locks: DashMap::new(),
            limiter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn vector_index(&self) -> &Arc<VectorIndex> {
        &self.vector
    }

    pub fn metadata_store(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn association_graph(&self) -> &Arc<AssociationGraph> {
        &self.graph
    }

    // ------------------------------------------------------------------
    // store
    // ------------------------------------------------------------------

    /// Store a memory. With `allow_duplicates == false`, a near-identical
    /// memory in the same scope short-circuits: the existing record is
    /// returned with `duplicate_of` set and nothing is written.
    pub async fn store(&self, params: StoreParams) -> Result<StoreOutcome> {
        let _permit = self.acquire_permit()?;
        scope::validate(&params.scope)?;
        let content = params.content.trim();
        if content.is_empty() {
            return Err(MemoryError::Validation(
                "content must not be empty".into(),
            ));
        }

        // Embed once; reused for the duplicate check, the upsert, and
        // auto-association. Failure is tolerated: the record is stored
        // without a vector and flagged for reconcile.
        let embedding = match self.embedder.embed(content).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(scope = %params.scope, error = %e, "Embedding failed, storing without vector");
                None
            }
        };

        if !params.allow_duplicates {
            if let Some(vector) = &embedding {
                let threshold = params
                    .duplicate_threshold
                    .unwrap_or(self.config.engine.duplicate_threshold);
                if let Some(existing) = self.find_duplicate(vector, &params.scope, threshold).await
                {
                    info!(
                        existing_id = %existing.id,
                        scope = %params.scope,
                        "Duplicate content detected, returning existing memory"
                    );
                    let duplicate_of = existing.id;
                    let has_embedding = self.vector.get_vector(existing.id).await.is_some();
                    return Ok(StoreOutcome {
                        memory: existing,
                        duplicate_of: Some(duplicate_of),
                        has_embedding,
                        partial_write: false,
                    });
                }
            }
        }

        let mut memory = Memory::new(
            content.to_string(),
            params.scope.clone(),
            params.tags,
            params.category,
            params.metadata,
        );
        if embedding.is_none() {
            memory
                .metadata
                .insert(EMBEDDING_MISSING_FLAG.into(), serde_json::Value::Bool(true));
        }
        let id = memory.id;
        let _guard = self.lock_id(id).await;

        // Parallel fan-out to the three stores.
        let vector_fut = async {
            match &embedding {
                Some(v) => self.vector.upsert(id, v.clone(), &params.scope, None).await,
                None => Ok(()),
            }
        };
        let metadata_fut = self.metadata.put(memory.clone());
        let graph_fut = self.graph.add_node(id);
        let (vector_res, metadata_res, graph_res) =
            tokio::join!(vector_fut, metadata_fut, graph_fut);

        if let Err(e) = metadata_res {
            // Primary store failed: the write fails. Undo the secondary
            // writes; both deletes are idempotent.
            warn!(memory_id = %id, error = %e, "Metadata write failed, rolling back secondaries");
            let _ = self.vector.delete(id).await;
            let _ = self.graph.remove_node(id).await;
            return Err(e);
        }

        let mut partial_write = false;
        if let Err(e) = vector_res {
            warn!(memory_id = %id, error = %e, "Vector upsert failed, flagged for reconcile");
            partial_write = true;
            self.flag_embedding_missing(&mut memory).await;
        }
        if let Err(e) = graph_res {
            warn!(memory_id = %id, error = %e, "Graph insert failed, flagged for reconcile");
            partial_write = true;
        }

        self.memory_cache.put(id, memory.clone());
        info!(
            memory_id = %id,
            scope = %params.scope,
            content_length = content.len(),
            has_embedding = embedding.is_some(),
            "Memory stored"
        );

        // Fire-and-forget auto-association; failures are logged, never
        // propagated.
        if self.config.engine.auto_associate {
            if let Some(vector) = embedding.clone() {
                self.spawn_auto_associate(id, vector, params.scope.clone());
            }
        }

        Ok(StoreOutcome {
            memory,
            duplicate_of: None,
            has_embedding: embedding.is_some(),
            partial_write,
        })
    }

    /// Search the same scope for an existing near-identical memory.
    async fn find_duplicate(&self, vector: &[f32], scope: &str, threshold: f32) -> Option<Memory> {
        let hits = self
            .vector
            .search(vector, &ScopeFilter::Exact(scope.to_string()), 5, threshold)
            .await;
        for (id, score) in hits {
            if let Some(memory) = self.metadata.get(id).await {
                debug!(existing_id = %id, score, "Duplicate candidate accepted");
                // Reading the duplicate counts as an access.
                let _ = self.metadata.record_access(id).await;
                self.memory_cache.remove(&id);
                return Some(memory);
            }
        }
        None
    }

    async fn flag_embedding_missing(&self, memory: &mut Memory) {
        memory
            .metadata
            .insert(EMBEDDING_MISSING_FLAG.into(), serde_json::Value::Bool(true));
        if let Err(e) = self.metadata.update(memory.clone()).await {
            warn!(memory_id = %memory.id, error = %e, "Failed to persist reconcile flag");
        }
    }

    /// Link `id` to its nearest neighbors in the same scope, off-task.
    /// Captures only the components it needs so the engine handle itself
    /// stays borrowable by the caller.
    fn spawn_auto_associate(&self, id: Uuid, vector: Vec<f32>, scope: String) {
        let index = Arc::clone(&self.vector);
        let graph = Arc::clone(&self.graph);
        let cfg = self.config.engine.clone();
        tokio::spawn(async move {
            let hits = index
                .search(
                    &vector,
                    &ScopeFilter::Exact(scope),
                    cfg.auto_associate_limit,
                    cfg.auto_associate_threshold,
                )
                .await;
            let mut created = 0usize;
            for (other, score) in hits {
                if other == id {
                    continue;
                }
                if let Err(e) = graph
                    .add_edge(id, other, &cfg.auto_associate_type, score, true)
                    .await
                {
                    warn!(memory_id = %id, error = %e, "Auto-association failed");
                    return;
                }
                created += 1;
            }
            debug!(memory_id = %id, created, "Auto-association completed");
        });
    }

    // ------------------------------------------------------------------
    // get / update / delete
    // ------------------------------------------------------------------

    /// Fetch a memory by id, bumping its access stats. Optionally attach
    /// up to `max_associations` incident edges.
    pub async fn get(
        &self,
        id: Uuid,
        include_associations: bool,
        max_associations: usize,
    ) -> Result<(Memory, Vec<Association>)> {
        let mut memory = match self.memory_cache.get(&id) {
            Some(m) => m,
            None => self.metadata.get(id).await.ok_or(MemoryError::NotFound(id))?,
        };
        self.metadata.record_access(id).await?;
        memory.access_count += 1;
        memory.accessed_at = Utc::now();
        self.memory_cache.put(id, memory.clone());

        let associations = if include_associations {
            let mut edges = self.graph.edges_of(id, Direction::Both, 0.0).await;
            edges.truncate(max_associations);
            edges
        } else {
            Vec::new()
        };
        Ok((memory, associations))
    }

    /// Apply a field-by-field update. Content changes force re-embedding;
    /// scope changes re-tag the vector record.
    pub async fn update(&self, id: Uuid, params: UpdateParams) -> Result<Memory> {
        let _permit = self.acquire_permit()?;
        if let Some(scope) = &params.scope {
            scope::validate(scope)?;
        }
        if let Some(content) = &params.content {
            if content.trim().is_empty() {
                return Err(MemoryError::Validation(
                    "content must not be empty".into(),
                ));
            }
        }
        let _guard = self.lock_id(id).await;

        let mut memory = self.metadata.get(id).await.ok_or(MemoryError::NotFound(id))?;

        let content_changed = params
            .content
            .as_ref()
            .map(|c| c.trim() != memory.content)
            .unwrap_or(false);
        let scope_changed = params
            .scope
            .as_ref()
            .map(|s| *s != memory.scope)
            .unwrap_or(false);

        if let Some(content) = params.content {
            memory.content = content.trim().to_string();
        }
        if let Some(scope) = params.scope {
            memory.scope = scope;
            memory.sync_scope_metadata();
        }
        if let Some(tags) = params.tags {
            memory.tags = normalize_tags(tags);
        }
        if let Some(category) = params.category {
            memory.category = category;
        }
        if let Some(extra) = params.metadata {
            memory.metadata.extend(extra);
            memory.sync_scope_metadata();
        }
        memory.updated_at = Utc::now();

        let mut new_vector = None;
        if content_changed {
            match self.embedder.embed(&memory.content).await {
                Ok(v) => {
                    memory.metadata.remove(EMBEDDING_MISSING_FLAG);
                    new_vector = Some(v);
                }
                Err(e) => {
                    warn!(memory_id = %id, error = %e, "Re-embedding failed, flagged for reconcile");
                    memory
                        .metadata
                        .insert(EMBEDDING_MISSING_FLAG.into(), serde_json::Value::Bool(true));
                }
            }
        }

        self.metadata.update(memory.clone()).await?;

        if let Some(vector) = &new_vector {
            // Delete + insert keeps dimension handling in one place.
            self.vector.delete(id).await?;
            if let Err(e) = self
                .vector
                .upsert(id, vector.clone(), &memory.scope, None)
                .await
            {
                warn!(memory_id = %id, error = %e, "Vector re-upsert failed, flagged for reconcile");
                self.flag_embedding_missing(&mut memory).await;
            }
        } else if scope_changed {
            self.vector.retag_scope(id, &memory.scope).await?;
        }

        if content_changed && !params.preserve_associations {
            let removed = self.graph.remove_auto_edges_from(id).await;
            debug!(memory_id = %id, removed, "Dropped auto edges after content change");
            if let Some(vector) = new_vector {
                self.spawn_auto_associate(id, vector, memory.scope.clone());
            }
        }

        self.memory_cache.put(id, memory.clone());
        info!(memory_id = %id, "Memory updated");
        Ok(memory)
    }

    /// Delete a memory from all three stores. Succeeds iff the metadata
    /// delete succeeded; secondary failures are logged and left to
    /// reconcile.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let _permit = self.acquire_permit()?;
        let _guard = self.lock_id(id).await;

        let (vector_res, metadata_res, graph_res) = tokio::join!(
            self.vector.delete(id),
            self.metadata.delete(id),
            self.graph.remove_node(id)
        );
        metadata_res?;
        if let Err(e) = vector_res {
            warn!(memory_id = %id, error = %e, "Vector delete failed; reconcile will remove the orphan");
        }
        if let Err(e) = graph_res {
            warn!(memory_id = %id, error = %e, "Graph node delete failed; reconcile will prune");
        }
        self.memory_cache.remove(&id);
        info!(memory_id = %id, "Memory deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // move / discover
    // ------------------------------------------------------------------

    /// Move memories to `target_scope`. Never aborts the batch: each id
    /// succeeds or lands in `failed_ids`.
    pub async fn move_memories(&self, ids: &[Uuid], target_scope: &str) -> Result<MoveOutcome> {
        scope::validate(target_scope)?;
        let mut moved = Vec::new();
        let mut failed_ids = Vec::new();
        for &id in ids {
            let params = UpdateParams {
                scope: Some(target_scope.to_string()),
                preserve_associations: true,
                ..UpdateParams::default()
            };
            match self.update(id, params).await {
                Ok(memory) => moved.push(memory),
                Err(e) => {
                    warn!(memory_id = %id, error = %e, "Move failed for memory");
                    failed_ids.push(id);
                }
            }
        }
        info!(
            moved = moved.len(),
            failed = failed_ids.len(),
            target_scope,
            "Move completed"
        );
        Ok(MoveOutcome { moved, failed_ids })
    }

    /// Discover semantically related memories across all scopes.
    ///
    /// Searches wide (3× the limit, threshold lowered by 0.2), widens once
    /// more with a tag/category-augmented query when short, then drops the
    /// source and de-duplicates by normalized content hash.
    pub async fn discover_associations(
        &self,
        id: Uuid,
        limit: usize,
        similarity_threshold: f32,
    ) -> Result<(Memory, Vec<ScoredMemory>)> {
        let _permit = self.acquire_permit()?;
        let source = self.metadata.get(id).await.ok_or(MemoryError::NotFound(id))?;

        let source_vector = match self.vector.get_vector(id).await {
            Some(v) => v,
            None => self.embedder.embed(&source.content).await?,
        };

        let mut hits = self
            .vector
            .search(
                &source_vector,
                &ScopeFilter::All,
                limit.saturating_mul(3),
                (similarity_threshold - 0.2).max(0.1),
            )
            .await;

        if hits.len() < limit + 1 {
            // Widen with tags and category folded into the query text.
            let mut augmented = source.content.clone();
            if !source.tags.is_empty() {
                augmented.push(' ');
                augmented.push_str(&source.tags.join(" "));
            }
            if let Some(category) = &source.category {
                augmented.push(' ');
                augmented.push_str(category);
            }
            if let Ok(vector) = self.embedder.embed(&augmented).await {
                let more = self
                    .vector
                    .search(
                        &vector,
                        &ScopeFilter::All,
                        limit.saturating_mul(2),
                        (similarity_threshold - 0.3).max(0.1),
                    )
                    .await;
                hits.extend(more);
            }
        }

        let mut seen_ids = HashSet::new();
        let mut seen_content = HashSet::new();
        let mut results = Vec::new();
        for (other, score) in hits {
            if other == id || !seen_ids.insert(other) {
                continue;
            }
            let Some(memory) = self.metadata.get(other).await else {
                continue;
            };
            // Identical content (case-insensitive, trimmed) adds nothing.
            if !seen_content.insert(content_digest(&memory.content)) {
                continue;
            }
            results.push(ScoredMemory { memory, score });
            if results.len() >= limit {
                break;
            }
        }
        debug!(memory_id = %id, found = results.len(), "Association discovery completed");
        Ok((source, results))
    }

    /// Write a complete record into all three stores, keeping its id and
    /// timestamps. Used by import: an existing record with the same id is
    /// replaced. Returns whether a vector was stored.
    pub async fn restore(&self, mut memory: Memory) -> Result<bool> {
        scope::validate(&memory.scope)?;
        if memory.content.trim().is_empty() {
            return Err(MemoryError::Validation(
                "content must not be empty".into(),
            ));
        }
        memory.sync_scope_metadata();
        let id = memory.id;
        let _guard = self.lock_id(id).await;

        let embedding = match self.embedder.embed(&memory.content).await {
            Ok(v) => {
                memory.metadata.remove(EMBEDDING_MISSING_FLAG);
                Some(v)
            }
            Err(e) => {
                warn!(memory_id = %id, error = %e, "Embedding failed during restore");
                memory
                    .metadata
                    .insert(EMBEDDING_MISSING_FLAG.into(), serde_json::Value::Bool(true));
                None
            }
        };

        let vector_fut = async {
            match &embedding {
                Some(v) => self.vector.upsert(id, v.clone(), &memory.scope, None).await,
                None => self.vector.delete(id).await,
            }
        };
        let metadata_fut = self.metadata.put(memory.clone());
        let graph_fut = self.graph.add_node(id);
        let (vector_res, metadata_res, graph_res) =
            tokio::join!(vector_fut, metadata_fut, graph_fut);

        if let Err(e) = metadata_res {
            let _ = self.vector.delete(id).await;
            let _ = self.graph.remove_node(id).await;
            return Err(e);
        }
        if let Err(e) = vector_res {
            warn!(memory_id = %id, error = %e, "Vector restore failed, flagged for reconcile");
        }
        if let Err(e) = graph_res {
            warn!(memory_id = %id, error = %e, "Graph restore failed, flagged for reconcile");
        }
        self.memory_cache.put(id, memory);
        Ok(embedding.is_some())
    }

    // ------------------------------------------------------------------
    // reconcile
    // ------------------------------------------------------------------

    /// Repair cross-store inconsistencies toward the metadata store.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let metadata_ids: HashSet<Uuid> = self.metadata.ids().await.into_iter().collect();
        let vector_ids: HashSet<Uuid> = self.vector.ids().await.into_iter().collect();

        // Metadata rows without a vector: re-embed and upsert.
        for &id in metadata_ids.difference(&vector_ids) {
            let _guard = self.lock_id(id).await;
            let Some(mut memory) = self.metadata.get(id).await else {
                continue;
            };
            match self.embedder.embed(&memory.content).await {
                Ok(vector) => {
                    match self.vector.upsert(id, vector, &memory.scope, None).await {
                        Ok(()) => {
                            if memory.metadata.remove(EMBEDDING_MISSING_FLAG).is_some() {
                                let _ = self.metadata.update(memory.clone()).await;
                                self.memory_cache.remove(&id);
                            }
                            report.vectors_restored += 1;
                        }
                        Err(e) => {
                            warn!(memory_id = %id, error = %e, "Reconcile upsert failed");
                            report.vectors_unrepairable += 1;
                        }
                    }
                }
                Err(e) => {
                    debug!(memory_id = %id, error = %e, "Reconcile could not embed");
                    report.vectors_unrepairable += 1;
                }
            }
        }

        // Vectors without a metadata row are orphans: delete.
        for &id in vector_ids.difference(&metadata_ids) {
            let _guard = self.lock_id(id).await;
            if self.metadata.contains(id).await {
                continue;
            }
            if self.vector.delete(id).await.is_ok() {
                report.orphan_vectors_removed += 1;
            }
        }

        // Edges with a missing endpoint: prune.
        report.dangling_edges_removed = self.graph.prune_dangling(&metadata_ids).await;

        if report != ReconcileReport::default() {
            info!(
                restored = report.vectors_restored,
                orphans = report.orphan_vectors_removed,
                edges = report.dangling_edges_removed,
                "Reconcile pass repaired inconsistencies"
            );
        }
        report
    }

    /// Run reconcile on an interval until the token is cancelled.
    pub fn spawn_reconcile_loop(
        self: Arc<Self>,
        token: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let engine = self;
        let interval = std::time::Duration::from_secs(engine.config.engine.reconcile_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        engine.graph.flush().await;
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let _ = engine.reconcile().await;
                    }
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // stats
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            total_memories: self.metadata.len().await,
            total_vectors: self.vector.len().await,
            graph_nodes: self.graph.node_count().await,
            graph_edges: self.graph.edge_count().await,
            distinct_scopes: self.metadata.list_scopes().await.len(),
            memory_cache: self.memory_cache.stats(),
        }
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        match self.limiter.try_acquire() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => Err(MemoryError::Overloaded),
            Err(TryAcquireError::Closed) => {
                Err(MemoryError::Internal("operation limiter closed".into()))
            }
        }
    }

    async fn lock_id(&self, id: Uuid) -> OwnedMutexGuard<()> {
        // The shard guard must drop before the await below.
        let lock = {
            let entry = self
                .id_locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        lock.lock_owned().await
    }
}

/// SHA-256 digest of trimmed, lowercased content. Dedup key for
/// association discovery and import duplicate checks.
pub fn content_digest(content: &str) -> [u8; 32] {
    let normalized = content.trim().to_lowercase();
    Sha256::digest(normalized.as_bytes()).into()
}
