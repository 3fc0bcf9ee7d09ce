//! Tiered search over the memory engine.
//!
//! Three strategies share one hydration path:
//! - **standard**: top-k cosine with an optional scope filter; degrades to
//!   tag/full-text matching when the embedding backend is down.
//! - **diversified**: MMR-style selection that trades a little relevance
//!   for mutual dissimilarity, growing the candidate pool until the limit
//!   is met or the expansion cap is reached.
//! - **hierarchical fallback**: honors the caller's scope but walks up the
//!   ancestor chain (then goes global) instead of returning nothing.
//!
//! Every returned hit bumps the memory's access stats, same as `get`.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::engine::MemoryEngine;
use crate::error::{MemoryError, Result};
use crate::model::{Association, Direction, Memory};
use crate::scope::{self, ScopeFilter};

/// Upper bound accepted for search limits.
pub const MAX_SEARCH_LIMIT: usize = 100;
/// Edges attached per hit when associations are requested.
const MAX_HIT_ASSOCIATIONS: usize = 3;
/// Hard cap on pool-expansion rounds in diversified search.
const MAX_EXPANSION_ROUNDS: usize = 8;

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub memory: Memory,
    pub score: f32,
    pub associations: Vec<Association>,
}

/// Standard search output.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// True when the embedding backend was down and results came from the
    /// tag/full-text fallback (scores are 0.0).
    pub degraded: bool,
}

/// Extra reporting for diversified searches.
#[derive(Debug, Clone, Copy)]
pub struct DiversityDiagnostics {
    pub candidates_examined: usize,
    pub final_expansion_factor: f32,
    /// True when the pool ran dry before `limit` diverse results were found.
    pub constraint_relaxed: bool,
}

#[derive(Debug, Clone)]
pub struct DiversifiedOutcome {
    pub hits: Vec<SearchHit>,
    pub degraded: bool,
    pub diagnostics: DiversityDiagnostics,
}

/// Hierarchical fallback output. `fallback_level` counts ancestor steps:
/// 0 for the original scope, `depth(original)` for the global search.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub hits: Vec<SearchHit>,
    pub fallback_level: u32,
    /// The scope that produced results; `None` means the global search.
    pub effective_scope: Option<String>,
    pub degraded: bool,
}

/// Search strategies over a shared engine.
pub struct SearchEngine {
    engine: Arc<MemoryEngine>,
}

impl SearchEngine {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self { engine }
    }

    // ------------------------------------------------------------------
    // standard
    // ------------------------------------------------------------------

    /// Top-`limit` memories by cosine similarity to `query`.
    pub async fn standard_search(
        &self,
        query: &str,
        filter: &ScopeFilter,
        limit: usize,
        min_score: f32,
        include_associations: bool,
    ) -> Result<SearchOutcome> {
        validate_query(query, limit)?;

        let query_vector = match self.engine.embedder().embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, degrading to text search");
                let hits = self.degraded_search(query, filter, limit).await;
                return Ok(SearchOutcome {
                    hits,
                    degraded: true,
                });
            }
        };

        let raw = self
            .engine
            .vector_index()
            .search(&query_vector, filter, limit, min_score)
            .await;
        let hits = self.hydrate(raw, include_associations).await;
        debug!(
            query_length = query.len(),
            results = hits.len(),
            "Standard search completed"
        );
        Ok(SearchOutcome {
            hits,
            degraded: false,
        })
    }

    /// Tag + full-text fallback when no query vector can be produced.
    /// Best-effort; all scores are 0.0.
    async fn degraded_search(
        &self,
        query: &str,
        filter: &ScopeFilter,
        limit: usize,
    ) -> Vec<SearchHit> {
        let metadata = self.engine.metadata_store();
        let mut merged = metadata.full_text_search(query, filter, limit).await;
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let tagged = metadata.search_by_tags(&tokens, filter, false, limit).await;
        let mut seen: HashSet<Uuid> = merged.iter().map(|m| m.id).collect();
        for memory in tagged {
            if seen.insert(memory.id) {
                merged.push(memory);
            }
        }
        merged.truncate(limit);
        let raw: Vec<(Uuid, f32)> = merged.into_iter().map(|m| (m.id, 0.0)).collect();
        self.hydrate(raw, false).await
    }

    // ------------------------------------------------------------------
    // diversified
    // ------------------------------------------------------------------

    /// MMR-style search: results score at least `min_score` against the
    /// query while staying pairwise below `diversity_threshold` cosine.
    #[allow(clippy::too_many_arguments)]
    pub async fn diversified_search(
        &self,
        query: &str,
        filter: &ScopeFilter,
        limit: usize,
        min_score: f32,
        diversity_threshold: f32,
        expansion_factor: f32,
        max_expansion_factor: f32,
        include_associations: bool,
    ) -> Result<DiversifiedOutcome> {
        validate_query(query, limit)?;
        if !(0.0..=1.0).contains(&diversity_threshold) {
            return Err(MemoryError::Validation(format!(
                "diversity_threshold must be in [0, 1], got {diversity_threshold}"
            )));
        }
        if expansion_factor < 1.0 || max_expansion_factor < expansion_factor {
            return Err(MemoryError::Validation(
                "expansion_factor must be >= 1 and <= max_expansion_factor".into(),
            ));
        }

        let query_vector = match self.engine.embedder().embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, degrading to text search");
                let hits = self.degraded_search(query, filter, limit).await;
                return Ok(DiversifiedOutcome {
                    hits,
                    degraded: true,
                    diagnostics: DiversityDiagnostics {
                        candidates_examined: 0,
                        final_expansion_factor: expansion_factor,
                        constraint_relaxed: true,
                    },
                });
            }
        };

        let mut expansion = expansion_factor;
        let mut selected: Vec<(Uuid, f32, Vec<f32>)> = Vec::new();
        let mut examined = 0usize;
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let k = (limit as f32 * expansion).ceil() as usize;
            let candidates = self
                .engine
                .vector_index()
                .search(&query_vector, filter, k, min_score)
                .await;
            examined = examined.max(candidates.len());

            // Greedy pick: highest score whose similarity to everything
            // already selected stays under the threshold.
            for (id, score) in &candidates {
                if selected.len() >= limit {
                    break;
                }
                if selected.iter().any(|(sid, _, _)| sid == id) {
                    continue;
                }
                let Some(vector) = self.engine.vector_index().get_vector(*id).await else {
                    continue;
                };
                let too_close = selected
                    .iter()
                    .any(|(_, _, sv)| cosine_similarity(&vector, sv) >= diversity_threshold);
                if !too_close {
                    selected.push((*id, *score, vector));
                }
            }

            let pool_exhausted = candidates.len() < k;
            if selected.len() >= limit
                || expansion >= max_expansion_factor
                || pool_exhausted
                || rounds >= MAX_EXPANSION_ROUNDS
            {
                break;
            }
            expansion = (expansion * 1.5).min(max_expansion_factor);
        }

        let constraint_relaxed = selected.len() < limit;
        selected.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let raw: Vec<(Uuid, f32)> = selected.into_iter().map(|(id, s, _)| (id, s)).collect();
        let hits = self.hydrate(raw, include_associations).await;
        debug!(
            results = hits.len(),
            examined, expansion, "Diversified search completed"
        );
        Ok(DiversifiedOutcome {
            hits,
            degraded: false,
            diagnostics: DiversityDiagnostics {
                candidates_examined: examined,
                final_expansion_factor: expansion,
                constraint_relaxed,
            },
        })
    }

    // ------------------------------------------------------------------
    // hierarchical fallback
    // ------------------------------------------------------------------

    /// Search `original_scope`, then its ancestors one segment at a time,
    /// then globally, returning the first level that yields anything.
    pub async fn hierarchical_fallback_search(
        &self,
        query: &str,
        original_scope: &str,
        limit: usize,
        min_score: f32,
        include_child_scopes: bool,
    ) -> Result<FallbackOutcome> {
        validate_query(query, limit)?;
        scope::validate(original_scope)?;

        let query_vector = match self.engine.embedder().embed(query).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, fallback search degrades to text");
                None
            }
        };

        let original_filter = ScopeFilter::from_request(Some(original_scope), include_child_scopes);
        let mut levels: Vec<(u32, Option<String>, ScopeFilter)> =
            vec![(0, Some(original_scope.to_string()), original_filter)];
        for (step, ancestor) in scope::ancestors(original_scope).iter().enumerate() {
            levels.push((
                (step + 1) as u32,
                Some(ancestor.to_string()),
                ScopeFilter::Subtree(ancestor.to_string()),
            ));
        }
        levels.push((scope::depth(original_scope) as u32, None, ScopeFilter::All));

        for (level, effective_scope, filter) in levels {
            let raw = match &query_vector {
                Some(vector) => {
                    self.engine
                        .vector_index()
                        .search(vector, &filter, limit, min_score)
                        .await
                }
                None => self
                    .engine
                    .metadata_store()
                    .full_text_search(query, &filter, limit)
                    .await
                    .into_iter()
                    .map(|m| (m.id, 0.0))
                    .collect(),
            };
            if !raw.is_empty() {
                debug!(
                    fallback_level = level,
                    effective_scope = effective_scope.as_deref().unwrap_or("<global>"),
                    results = raw.len(),
                    "Hierarchical fallback found results"
                );
                let hits = self.hydrate(raw, false).await;
                return Ok(FallbackOutcome {
                    hits,
                    fallback_level: level,
                    effective_scope,
                    degraded: query_vector.is_none(),
                });
            }
        }

        Ok(FallbackOutcome {
            hits: Vec::new(),
            fallback_level: scope::depth(original_scope) as u32,
            effective_scope: None,
            degraded: query_vector.is_none(),
        })
    }

    // ------------------------------------------------------------------
    // hydration
    // ------------------------------------------------------------------

    /// Turn raw `(id, score)` pairs into full hits, bumping access stats
    /// and optionally attaching the strongest incident edges.
    async fn hydrate(&self, raw: Vec<(Uuid, f32)>, include_associations: bool) -> Vec<SearchHit> {
        let mut hits = Vec::with_capacity(raw.len());
        for (id, score) in raw {
            let Some(mut memory) = self.engine.metadata_store().get(id).await else {
                // The vector index can briefly lead the metadata store;
                // skip rather than fail the whole search.
                continue;
            };
            if self.engine.metadata_store().record_access(id).await.is_ok() {
                memory.access_count += 1;
            }
            let associations = if include_associations {
                let mut edges = self
                    .engine
                    .association_graph()
                    .edges_of(id, Direction::Both, 0.0)
                    .await;
                edges.truncate(MAX_HIT_ASSOCIATIONS);
                edges
            } else {
                Vec::new()
            };
            hits.push(SearchHit {
                memory,
                score,
                associations,
            });
        }
        hits
    }
}

fn validate_query(query: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(MemoryError::Validation("query must not be empty".into()));
    }
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(MemoryError::Validation(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbeddingBackend};
    use crate::embedding::create_embedder;
    use crate::engine::StoreParams;
    use std::collections::BTreeMap;

    async fn setup() -> (tempfile::TempDir, Arc<MemoryEngine>, SearchEngine) {
        setup_with_backend(EmbeddingBackend::Hash).await
    }

    async fn setup_with_backend(
        backend: EmbeddingBackend,
    ) -> (tempfile::TempDir, Arc<MemoryEngine>, SearchEngine) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.embedding.backend = backend;
        config.embedding.dimension = 128;
        let embedder = create_embedder(&config.embedding);
        let engine = Arc::new(MemoryEngine::new(config, embedder).unwrap());
        let search = SearchEngine::new(Arc::clone(&engine));
        (dir, engine, search)
    }

    fn params(content: &str, scope: &str) -> StoreParams {
        StoreParams {
            content: content.to_string(),
            scope: scope.to_string(),
            tags: vec![],
            category: None,
            metadata: BTreeMap::new(),
            allow_duplicates: true,
            duplicate_threshold: None,
        }
    }

    #[tokio::test]
    async fn test_store_then_search_finds_it() {
        let (_dir, engine, search) = setup().await;
        let stored = engine
            .store(params(
                "FastAPI is a Python web framework",
                "learning/programming",
            ))
            .await
            .unwrap();

        let outcome = search
            .standard_search(
                "Python web framework",
                &ScopeFilter::Exact("learning/programming".into()),
                5,
                0.2,
                false,
            )
            .await
            .unwrap();
        assert!(!outcome.degraded);
        assert!(!outcome.hits.is_empty());
        assert_eq!(outcome.hits[0].memory.id, stored.memory.id);
        assert!(
            outcome.hits[0].score >= 0.6,
            "expected strong overlap, got {}",
            outcome.hits[0].score
        );
    }

    #[tokio::test]
    async fn test_search_respects_scope_filter() {
        let (_dir, engine, search) = setup().await;
        engine.store(params("rust notes alpha", "a")).await.unwrap();
        engine.store(params("rust notes beta", "b")).await.unwrap();

        let outcome = search
            .standard_search("rust notes", &ScopeFilter::Exact("a".into()), 10, 0.1, false)
            .await
            .unwrap();
        assert!(outcome.hits.iter().all(|h| h.memory.scope == "a"));
    }

    #[tokio::test]
    async fn test_search_bumps_access_stats() {
        let (_dir, engine, search) = setup().await;
        let stored = engine.store(params("accessed memory", "s")).await.unwrap();
        search
            .standard_search("accessed memory", &ScopeFilter::All, 5, 0.1, false)
            .await
            .unwrap();
        let memory = engine.metadata_store().get(stored.memory.id).await.unwrap();
        assert!(memory.access_count >= 1);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let (_dir, _engine, search) = setup().await;
        for (query, limit) in [("", 5), ("   ", 5), ("ok", 0), ("ok", 101)] {
            let err = search
                .standard_search(query, &ScopeFilter::All, limit, 0.1, false)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation", "query={query:?} limit={limit}");
        }
    }

    #[tokio::test]
    async fn test_degraded_search_on_embedding_failure() {
        let (_dir, engine, search) = setup_with_backend(EmbeddingBackend::None).await;
        // Store succeeds without a vector
        engine
            .store(params("deployment checklist for staging", "ops"))
            .await
            .unwrap();

        let outcome = search
            .standard_search("checklist", &ScopeFilter::All, 5, 0.1, false)
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].score, 0.0, "degraded hits score 0");
    }

    #[tokio::test]
    async fn test_diversified_search_excludes_near_duplicates() {
        let (_dir, engine, search) = setup().await;
        // Two nearly identical memories plus one distinct
        engine
            .store(params("tokio spawn blocking tasks guide", "s"))
            .await
            .unwrap();
        engine
            .store(params("tokio spawn blocking tasks guide v2", "s"))
            .await
            .unwrap();
        engine
            .store(params("postgres index tuning notes", "s"))
            .await
            .unwrap();

        let outcome = search
            .diversified_search(
                "tokio spawn blocking tasks",
                &ScopeFilter::All,
                2,
                0.0,
                0.9,
                3.0,
                10.0,
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.hits.len(), 2);
        // Pairwise similarity constraint holds
        let v0 = engine
            .vector_index()
            .get_vector(outcome.hits[0].memory.id)
            .await
            .unwrap();
        let v1 = engine
            .vector_index()
            .get_vector(outcome.hits[1].memory.id)
            .await
            .unwrap();
        assert!(
            cosine_similarity(&v0, &v1) < 0.9,
            "selected results must stay under the diversity threshold"
        );
        // Highest scoring candidate comes first
        assert!(outcome.hits[0].score >= outcome.hits[1].score);
    }

    #[tokio::test]
    async fn test_diversified_search_reports_relaxation() {
        let (_dir, engine, search) = setup().await;
        engine.store(params("only one note here", "s")).await.unwrap();
        let outcome = search
            .diversified_search(
                "note",
                &ScopeFilter::All,
                5,
                0.0,
                0.8,
                2.0,
                4.0,
                false,
            )
            .await
            .unwrap();
        assert!(outcome.hits.len() < 5);
        assert!(outcome.diagnostics.constraint_relaxed);
    }

    #[tokio::test]
    async fn test_diversified_search_validation() {
        let (_dir, _engine, search) = setup().await;
        let err = search
            .diversified_search("q", &ScopeFilter::All, 5, 0.0, 1.5, 2.0, 4.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = search
            .diversified_search("q", &ScopeFilter::All, 5, 0.0, 0.8, 5.0, 2.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_hierarchical_fallback_level_zero() {
        let (_dir, engine, search) = setup().await;
        engine
            .store(params("architecture overview document", "work/architecture"))
            .await
            .unwrap();
        let outcome = search
            .hierarchical_fallback_search(
                "architecture overview",
                "work/architecture",
                5,
                0.1,
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.fallback_level, 0);
        assert_eq!(outcome.effective_scope.as_deref(), Some("work/architecture"));
        assert!(!outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn test_hierarchical_fallback_walks_ancestors() {
        let (_dir, engine, search) = setup().await;
        engine
            .store(params("architecture docs for the platform", "work/architecture"))
            .await
            .unwrap();

        // Two ancestor steps from the requested scope to the memory's scope
        let outcome = search
            .hierarchical_fallback_search(
                "architecture docs",
                "work/architecture/decisions/legacy",
                5,
                0.1,
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.fallback_level, 2);
        assert_eq!(outcome.effective_scope.as_deref(), Some("work/architecture"));
        assert!(!outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn test_hierarchical_fallback_goes_global() {
        let (_dir, engine, search) = setup().await;
        engine
            .store(params("completely elsewhere content", "personal/misc"))
            .await
            .unwrap();

        let outcome = search
            .hierarchical_fallback_search(
                "completely elsewhere content",
                "nonexistent/scope/deep/nested",
                5,
                0.1,
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.fallback_level, 4, "global level equals scope depth");
        assert!(outcome.effective_scope.is_none());
        assert!(!outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn test_hierarchical_fallback_empty_corpus() {
        let (_dir, _engine, search) = setup().await;
        let outcome = search
            .hierarchical_fallback_search("anything", "a/b/c", 5, 0.1, false)
            .await
            .unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.fallback_level, 3);
        assert!(outcome.effective_scope.is_none());
    }

    #[tokio::test]
    async fn test_search_includes_associations_when_requested() {
        let (_dir, engine, search) = setup().await;
        engine
            .store(params("linked memory about rust traits", "s"))
            .await
            .unwrap();
        engine
            .store(params("linked memory about rust traits again", "s"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let outcome = search
            .standard_search("rust traits", &ScopeFilter::All, 5, 0.1, true)
            .await
            .unwrap();
        assert!(
            outcome.hits.iter().any(|h| !h.associations.is_empty()),
            "auto-associated hits should carry edges"
        );
        assert!(outcome
            .hits
            .iter()
            .all(|h| h.associations.len() <= MAX_HIT_ASSOCIATIONS));
    }
}
