//! Operation facade consumed by the tool-framing layer.
//!
//! One method per operation: validate the typed request, run it against the
//! engine/search/session/export internals, and project the result through
//! the response shaper at the caller's level. Errors shape through the same
//! envelope via [`crate::response::error_response`].

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::engine::{MemoryEngine, StoreParams, UpdateParams};
use crate::error::Result;
use crate::export;
use crate::response::{
    association_json, association_preview, memory_json, success_response, Pagination,
    ResponseLevel,
};
use crate::scope::{self, ScopeFilter};
use crate::search::{SearchEngine, SearchHit};
use crate::session;

use super::requests::*;

/// The in-process service handle. Constructed once at startup and handed
/// to the framing layer; there is no global state.
pub struct MemoryService {
    engine: Arc<MemoryEngine>,
    search: SearchEngine,
}

impl MemoryService {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        let search = SearchEngine::new(Arc::clone(&engine));
        Self { engine, search }
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    // ------------------------------------------------------------------
    // store
    // ------------------------------------------------------------------

    pub async fn store(&self, request: StoreRequest) -> Result<Value> {
        request.validate()?;
        let level = request.response_level;
        let outcome = self
            .engine
            .store(StoreParams {
                content: request.content,
                scope: request.scope,
                tags: request.tags,
                category: request.category,
                metadata: request.metadata,
                allow_duplicates: request.allow_duplicates,
                duplicate_threshold: Some(request.duplicate_threshold),
            })
            .await?;

        let message = match outcome.duplicate_of {
            Some(id) => format!("Duplicate content; returning existing memory {id}"),
            None => format!("Memory stored in scope '{}'", outcome.memory.scope),
        };

        let mut payload = Map::new();
        payload.insert("memory_id".into(), json!(outcome.memory.id));
        if level != ResponseLevel::Minimal {
            payload.insert("scope".into(), json!(outcome.memory.scope));
            payload.insert("created_at".into(), json!(outcome.memory.created_at));
            if let Some(duplicate_of) = outcome.duplicate_of {
                payload.insert(
                    "duplicate_analysis".into(),
                    json!({
                        "duplicate_found": true,
                        "duplicate_of": duplicate_of,
                    }),
                );
            }
        }
        if level == ResponseLevel::Full {
            payload.insert(
                "memory".into(),
                memory_json(&outcome.memory, ResponseLevel::Full, None),
            );
            payload.insert(
                "diagnostics".into(),
                json!({
                    "has_embedding": outcome.has_embedding,
                    "partial_write": outcome.partial_write,
                }),
            );
        }
        Ok(success_response(&message, payload))
    }

    // ------------------------------------------------------------------
    // search
    // ------------------------------------------------------------------

    /// Semantic search. With a scope, falls back up the hierarchy instead
    /// of returning an empty result for an over-specific path.
    pub async fn search(&self, request: SearchRequest) -> Result<Value> {
        request.validate()?;
        let level = request.response_level;

        let (hits, degraded, fallback): (Vec<SearchHit>, bool, Option<(u32, Option<String>)>) =
            match &request.scope {
                Some(scope_path) => {
                    let outcome = self
                        .search
                        .hierarchical_fallback_search(
                            &request.query,
                            scope_path,
                            request.limit,
                            request.similarity_threshold,
                            request.include_child_scopes,
                        )
                        .await?;
                    (
                        outcome.hits,
                        outcome.degraded,
                        Some((outcome.fallback_level, outcome.effective_scope)),
                    )
                }
                None => {
                    let outcome = self
                        .search
                        .standard_search(
                            &request.query,
                            &ScopeFilter::All,
                            request.limit,
                            request.similarity_threshold,
                            request.include_associations,
                        )
                        .await?;
                    (outcome.hits, outcome.degraded, None)
                }
            };

        let total = hits.len();
        let mut payload = Map::new();
        payload.insert("total_count".into(), json!(total));
        payload.insert("results".into(), project_hits(&hits, level));
        if level != ResponseLevel::Minimal {
            payload.insert("query".into(), json!(request.query));
            if let Some(scope_path) = &request.scope {
                payload.insert("scope".into(), json!(scope_path));
            }
            let mut metadata = Map::new();
            if let Some((fallback_level, effective_scope)) = &fallback {
                metadata.insert("fallback_level".into(), json!(fallback_level));
                metadata.insert("effective_scope".into(), json!(effective_scope));
            }
            if degraded {
                metadata.insert("degraded".into(), json!(true));
            }
            if level == ResponseLevel::Full {
                metadata.insert(
                    "similarity_threshold".into(),
                    json!(request.similarity_threshold),
                );
            }
            payload.insert("search_metadata".into(), Value::Object(metadata));
        }
        Ok(success_response(&format!("Found {total} memories"), payload))
    }

    pub async fn diversified_search(&self, request: DiversifiedSearchRequest) -> Result<Value> {
        request.validate()?;
        let level = request.response_level;
        let filter = ScopeFilter::from_request(request.scope.as_deref(), request.include_child_scopes);
        if let Some(scope_path) = &request.scope {
            scope::validate(scope_path)?;
        }
        let outcome = self
            .search
            .diversified_search(
                &request.query,
                &filter,
                request.limit,
                request.min_score,
                request.diversity_threshold,
                request.expansion_factor,
                request.max_expansion_factor,
                request.include_associations,
            )
            .await?;

        let total = outcome.hits.len();
        let mut payload = Map::new();
        payload.insert("total_count".into(), json!(total));
        payload.insert("results".into(), project_hits(&outcome.hits, level));
        if level != ResponseLevel::Minimal {
            payload.insert("query".into(), json!(request.query));
            if let Some(scope_path) = &request.scope {
                payload.insert("scope".into(), json!(scope_path));
            }
            let mut metadata = Map::new();
            metadata.insert("search_type".into(), json!("diversified"));
            metadata.insert(
                "diversity_threshold".into(),
                json!(request.diversity_threshold),
            );
            if outcome.diagnostics.constraint_relaxed {
                metadata.insert("constraint_relaxed".into(), json!(true));
            }
            if outcome.degraded {
                metadata.insert("degraded".into(), json!(true));
            }
            if level == ResponseLevel::Full {
                metadata.insert(
                    "candidates_examined".into(),
                    json!(outcome.diagnostics.candidates_examined),
                );
                metadata.insert(
                    "final_expansion_factor".into(),
                    json!(outcome.diagnostics.final_expansion_factor),
                );
            }
            payload.insert("search_metadata".into(), Value::Object(metadata));
        }
        Ok(success_response(
            &format!("Found {total} diverse memories"),
            payload,
        ))
    }

    // ------------------------------------------------------------------
    // get / update / delete
    // ------------------------------------------------------------------

    pub async fn get(&self, request: GetRequest) -> Result<Value> {
        let level = request.response_level;
        let (memory, associations) = self
            .engine
            .get(request.memory_id, request.include_associations, 10)
            .await?;

        let mut payload = Map::new();
        payload.insert("memory_id".into(), json!(memory.id));
        if level != ResponseLevel::Minimal {
            payload.insert(
                "memory".into(),
                memory_json(&memory, level, None),
            );
            if !associations.is_empty() {
                let projected: Vec<Value> = associations
                    .iter()
                    .map(|a| association_json(a, level))
                    .collect();
                payload.insert("associations".into(), json!(projected));
            }
        }
        Ok(success_response("Memory retrieved", payload))
    }

    pub async fn update(&self, request: UpdateRequest) -> Result<Value> {
        let level = request.response_level;
        let memory = self
            .engine
            .update(
                request.memory_id,
                UpdateParams {
                    content: request.content,
                    scope: request.scope,
                    tags: request.tags,
                    category: request.category.map(Some),
                    metadata: request.metadata,
                    preserve_associations: request.preserve_associations,
                },
            )
            .await?;

        let mut payload = Map::new();
        payload.insert("memory_id".into(), json!(memory.id));
        if level != ResponseLevel::Minimal {
            payload.insert("memory".into(), memory_json(&memory, level, None));
        }
        Ok(success_response("Memory updated", payload))
    }

    pub async fn delete(&self, request: DeleteRequest) -> Result<Value> {
        self.engine.delete(request.memory_id).await?;
        let mut payload = Map::new();
        payload.insert("deleted_id".into(), json!(request.memory_id));
        Ok(success_response("Memory deleted", payload))
    }

    // ------------------------------------------------------------------
    // move / discover
    // ------------------------------------------------------------------

    pub async fn move_memories(&self, request: MoveRequest) -> Result<Value> {
        let level = request.response_level;
        let outcome = self
            .engine
            .move_memories(&request.memory_ids, &request.target_scope)
            .await?;

        let mut payload = Map::new();
        payload.insert("moved_count".into(), json!(outcome.moved.len()));
        payload.insert("failed_count".into(), json!(outcome.failed_ids.len()));
        if level != ResponseLevel::Minimal {
            payload.insert("target_scope".into(), json!(request.target_scope));
            payload.insert(
                "failed_ids".into(),
                json!(outcome.failed_ids),
            );
        }
        if level == ResponseLevel::Full {
            let moved: Vec<Value> = outcome
                .moved
                .iter()
                .map(|m| memory_json(m, ResponseLevel::Full, None))
                .collect();
            payload.insert("moved".into(), json!(moved));
        } else if level == ResponseLevel::Standard {
            let moved: Vec<Value> = outcome
                .moved
                .iter()
                .map(|m| memory_json(m, ResponseLevel::Standard, None))
                .collect();
            payload.insert("moved".into(), json!(moved));
        }
        Ok(success_response(
            &format!(
                "Moved {} memories to '{}' ({} failed)",
                outcome.moved.len(),
                request.target_scope,
                outcome.failed_ids.len()
            ),
            payload,
        ))
    }

    pub async fn discover_associations(
        &self,
        request: DiscoverAssociationsRequest,
    ) -> Result<Value> {
        request.validate()?;
        let level = request.response_level;
        let (source, related) = self
            .engine
            .discover_associations(
                request.memory_id,
                request.limit,
                request.similarity_threshold,
            )
            .await?;

        let total = related.len();
        let mut payload = Map::new();
        payload.insert("source_memory_id".into(), json!(source.id));
        payload.insert("total_found".into(), json!(total));
        if level != ResponseLevel::Minimal {
            payload.insert(
                "source_content".into(),
                json!(association_preview(&source.content)),
            );
            let associations: Vec<Value> = related
                .iter()
                .map(|scored| match level {
                    ResponseLevel::Full => {
                        memory_json(&scored.memory, ResponseLevel::Full, Some(scored.score))
                    }
                    _ => json!({
                        "memory_id": scored.memory.id,
                        "scope": scored.memory.scope,
                        "content": association_preview(&scored.memory.content),
                        "similarity_score": scored.score,
                    }),
                })
                .collect();
            payload.insert("associations".into(), json!(associations));
        }
        if level == ResponseLevel::Full {
            payload.insert(
                "search_metadata".into(),
                json!({ "similarity_threshold": request.similarity_threshold }),
            );
            payload.insert(
                "source_memory".into(),
                memory_json(&source, ResponseLevel::Full, None),
            );
        }
        Ok(success_response(
            &format!("Found {total} associations"),
            payload,
        ))
    }

    // ------------------------------------------------------------------
    // listing
    // ------------------------------------------------------------------

    pub async fn list_all(&self, request: ListAllRequest) -> Result<Value> {
        request.validate()?;
        let level = request.response_level;
        let total_items = self.engine.metadata_store().count(&ScopeFilter::All).await;
        let offset = (request.page - 1) * request.per_page;
        let memories = self
            .engine
            .metadata_store()
            .list(&ScopeFilter::All, request.per_page, offset)
            .await;
        let pagination = Pagination::new(request.page, request.per_page, total_items);

        let mut payload = Map::new();
        payload.insert("total_count".into(), json!(total_items));
        if level == ResponseLevel::Minimal {
            let ids: Vec<Value> = memories.iter().map(|m| json!(m.id)).collect();
            payload.insert("memory_ids".into(), json!(ids));
        } else {
            let projected: Vec<Value> = memories
                .iter()
                .map(|m| memory_json(m, level, None))
                .collect();
            payload.insert("memories".into(), json!(projected));
            payload.insert("pagination".into(), serde_json::to_value(pagination)?);
        }
        Ok(success_response(
            &format!(
                "Page {}/{} ({} memories total)",
                pagination.page, pagination.total_pages.max(1), total_items
            ),
            payload,
        ))
    }

    pub async fn list_scopes(&self, request: ListScopesRequest) -> Result<Value> {
        let level = request.response_level;
        if let Some(parent) = &request.parent_scope {
            scope::validate(parent)?;
        }
        let all_scopes = self.engine.metadata_store().list_scopes().await;
        let selected: Vec<String> = match &request.parent_scope {
            Some(parent) => scope::children_of(parent, &all_scopes),
            None => all_scopes.clone(),
        };

        let mut scopes_json = Vec::with_capacity(selected.len());
        for scope_path in &selected {
            let child_count = scope::children_of(scope_path, &all_scopes).len();
            let mut entry = Map::new();
            entry.insert("scope".into(), json!(scope_path));
            entry.insert("child_count".into(), json!(child_count));
            if request.include_memory_counts {
                let count = self
                    .engine
                    .metadata_store()
                    .count(&ScopeFilter::Subtree(scope_path.clone()))
                    .await;
                entry.insert("memory_count".into(), json!(count));
            }
            scopes_json.push(Value::Object(entry));
        }

        let mut payload = Map::new();
        payload.insert("total_scopes".into(), json!(selected.len()));
        if level != ResponseLevel::Minimal {
            payload.insert("scopes".into(), json!(scopes_json));
            if let Some(parent) = &request.parent_scope {
                payload.insert("parent_scope".into(), json!(parent));
            }
        }
        Ok(success_response(
            &format!("Retrieved {} scopes", selected.len()),
            payload,
        ))
    }

    pub async fn suggest_scope(&self, request: SuggestScopeRequest) -> Result<Value> {
        let level = request.response_level;
        let (primary, alternatives) =
            scope::suggest::suggest_scope(&request.content, request.current_scope.as_deref());

        let mut payload = Map::new();
        payload.insert("suggested_scope".into(), json!(primary.scope));
        payload.insert("confidence".into(), json!(primary.confidence));
        if level != ResponseLevel::Minimal {
            payload.insert("reasoning".into(), json!(primary.reasoning));
            payload.insert("alternatives".into(), serde_json::to_value(&alternatives)?);
            if let Some(current) = &request.current_scope {
                payload.insert("current_scope".into(), json!(current));
            }
        }
        Ok(success_response("Scope suggestion generated", payload))
    }

    // ------------------------------------------------------------------
    // sessions
    // ------------------------------------------------------------------

    pub async fn session_manage(&self, request: SessionManageRequest) -> Result<Value> {
        let level = request.response_level;
        match request.action {
            SessionAction::Create => {
                let info = session::create_session(&self.engine, request.session_id).await?;
                let mut payload = Map::new();
                payload.insert("session_id".into(), json!(info.session_id));
                if level != ResponseLevel::Minimal {
                    payload.insert("scope".into(), json!(info.scope));
                    payload.insert("created_at".into(), json!(info.created_at));
                }
                Ok(success_response(
                    &format!("Session '{}' created", info.session_id),
                    payload,
                ))
            }
            SessionAction::List => {
                let sessions = session::list_sessions(&self.engine).await?;
                let mut payload = Map::new();
                payload.insert("session_count".into(), json!(sessions.len()));
                if level != ResponseLevel::Minimal {
                    payload.insert("sessions".into(), serde_json::to_value(&sessions)?);
                }
                Ok(success_response(
                    &format!("Found {} active sessions", sessions.len()),
                    payload,
                ))
            }
            SessionAction::Cleanup => {
                let outcome =
                    session::cleanup_sessions(&self.engine, request.max_age_days).await?;
                let mut payload = Map::new();
                payload.insert("cleaned_count".into(), json!(outcome.cleaned_memories));
                if level != ResponseLevel::Minimal {
                    payload.insert(
                        "cleaned_sessions".into(),
                        json!(outcome.cleaned_sessions),
                    );
                }
                Ok(success_response(
                    &format!("Cleaned up {} session memories", outcome.cleaned_memories),
                    payload,
                ))
            }
        }
    }

    // ------------------------------------------------------------------
    // export / import
    // ------------------------------------------------------------------

    pub async fn export(&self, request: ExportRequest) -> Result<Value> {
        let level = request.response_level;
        let outcome = export::export_memories(
            &self.engine,
            export::ExportParams {
                scope: request.scope.clone(),
                include_associations: request.include_associations,
                format: request.format,
                file_path: request.file_path,
                compression: request.compression,
            },
        )
        .await?;

        let mut payload = Map::new();
        payload.insert("exported_count".into(), json!(outcome.exported_count));
        if let Some(path) = &outcome.file_path {
            payload.insert("file_path".into(), json!(path.display().to_string()));
        }
        if level != ResponseLevel::Minimal {
            if let Some(data) = outcome.export_data {
                payload.insert("export_data".into(), json!(data));
            }
            payload.insert("compression_used".into(), json!(outcome.compression_used));
            if let Some(scope_path) = &request.scope {
                payload.insert("scope".into(), json!(scope_path));
            }
        }
        Ok(success_response(
            &format!("Exported {} memories", outcome.exported_count),
            payload,
        ))
    }

    pub async fn import(&self, request: ImportRequest) -> Result<Value> {
        let level = request.response_level;
        let outcome = export::import_memories(
            &self.engine,
            export::ImportParams {
                file_path: request.file_path,
                import_data: request.import_data,
                merge_strategy: request.merge_strategy,
                target_scope_prefix: request.target_scope_prefix,
                validate_data: request.validate_data,
            },
        )
        .await?;

        let mut payload = Map::new();
        payload.insert("imported_count".into(), json!(outcome.imported_count));
        payload.insert("skipped_count".into(), json!(outcome.skipped_count));
        payload.insert("error_count".into(), json!(outcome.error_count));
        if level != ResponseLevel::Minimal {
            payload.insert("imported_scopes".into(), json!(outcome.imported_scopes));
        }
        if level == ResponseLevel::Full {
            payload.insert("errors".into(), json!(outcome.errors));
        }
        Ok(success_response(
            &format!(
                "Imported {} memories ({} skipped, {} errors)",
                outcome.imported_count, outcome.skipped_count, outcome.error_count
            ),
            payload,
        ))
    }
}

/// Project search hits per level. Minimal carries ids only.
fn project_hits(hits: &[SearchHit], level: ResponseLevel) -> Value {
    match level {
        ResponseLevel::Minimal => {
            let ids: Vec<Value> = hits.iter().map(|h| json!(h.memory.id)).collect();
            json!(ids)
        }
        _ => {
            let projected: Vec<Value> = hits
                .iter()
                .map(|hit| {
                    let mut value = memory_json(&hit.memory, level, Some(hit.score));
                    if !hit.associations.is_empty() {
                        let edges: Vec<Value> = hit
                            .associations
                            .iter()
                            .map(|a| association_json(a, level))
                            .collect();
                        value["associations"] = json!(edges);
                    }
                    value
                })
                .collect();
            json!(projected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::HashEmbedder;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    async fn service() -> (tempfile::TempDir, MemoryService) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.embedding.dimension = 128;
        let embedder = Arc::new(HashEmbedder::new(128));
        let engine = Arc::new(MemoryEngine::new(config, embedder).unwrap());
        (dir, MemoryService::new(engine))
    }

    fn store_request(content: &str, scope: &str, level: ResponseLevel) -> StoreRequest {
        StoreRequest {
            content: content.into(),
            scope: scope.into(),
            tags: vec![],
            category: None,
            metadata: BTreeMap::new(),
            allow_duplicates: true,
            duplicate_threshold: 0.95,
            response_level: level,
        }
    }

    #[tokio::test]
    async fn test_store_minimal_response_shape() {
        let (_dir, service) = service().await;
        let value = service
            .store(store_request("note", "s", ResponseLevel::Minimal))
            .await
            .unwrap();
        assert_eq!(value["success"], json!(true));
        assert!(value.get("memory_id").is_some());
        assert!(value.get("scope").is_none(), "minimal omits scope");
        assert!(value.get("memory").is_none(), "minimal omits the body");
    }

    #[tokio::test]
    async fn test_store_full_response_shape() {
        let (_dir, service) = service().await;
        let value = service
            .store(store_request("full note", "s", ResponseLevel::Full))
            .await
            .unwrap();
        assert!(value.get("memory").is_some());
        assert_eq!(value["memory"]["content"], json!("full note"));
        assert_eq!(value["diagnostics"]["has_embedding"], json!(true));
    }

    #[tokio::test]
    async fn test_store_duplicate_reports_analysis() {
        let (_dir, service) = service().await;
        let mut request = store_request("same note", "dup", ResponseLevel::Standard);
        request.allow_duplicates = false;
        let first = service.store(request.clone()).await.unwrap();
        let second = service.store(request).await.unwrap();
        assert_eq!(second["memory_id"], first["memory_id"]);
        assert_eq!(second["duplicate_analysis"]["duplicate_found"], json!(true));
    }

    #[tokio::test]
    async fn test_search_with_scope_reports_fallback() {
        let (_dir, service) = service().await;
        service
            .store(store_request(
                "architecture docs for the platform",
                "work/architecture",
                ResponseLevel::Minimal,
            ))
            .await
            .unwrap();

        let value = service
            .search(SearchRequest {
                query: "architecture docs".into(),
                scope: Some("work/architecture/decisions/legacy".into()),
                include_child_scopes: false,
                limit: 5,
                similarity_threshold: 0.1,
                include_associations: false,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(value["search_metadata"]["fallback_level"], json!(2));
        assert_eq!(
            value["search_metadata"]["effective_scope"],
            json!("work/architecture")
        );
        assert!(value["total_count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_search_minimal_returns_ids_only() {
        let (_dir, service) = service().await;
        service
            .store(store_request("findable note", "s", ResponseLevel::Minimal))
            .await
            .unwrap();
        let value = service
            .search(SearchRequest {
                query: "findable note".into(),
                scope: None,
                include_child_scopes: false,
                limit: 5,
                similarity_threshold: 0.1,
                include_associations: false,
                response_level: ResponseLevel::Minimal,
            })
            .await
            .unwrap();
        let results = value["results"].as_array().unwrap();
        assert!(results[0].is_string(), "minimal results are bare ids");
        assert!(value.get("search_metadata").is_none());
    }

    #[tokio::test]
    async fn test_search_standard_previews_content() {
        let (_dir, service) = service().await;
        let long = format!("needle {}", "x".repeat(200));
        service
            .store(store_request(&long, "s", ResponseLevel::Minimal))
            .await
            .unwrap();
        let value = service
            .search(SearchRequest {
                query: "needle".into(),
                scope: None,
                include_child_scopes: false,
                limit: 5,
                similarity_threshold: 0.0,
                include_associations: false,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        let content = value["results"][0]["content"].as_str().unwrap();
        assert!(content.ends_with("..."));
        assert!(content.chars().count() <= 103);
    }

    #[tokio::test]
    async fn test_get_not_found_error_kind() {
        let (_dir, service) = service().await;
        let err = service
            .get(GetRequest {
                memory_id: Uuid::new_v4(),
                include_associations: false,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_update_and_delete_roundtrip() {
        let (_dir, service) = service().await;
        let stored = service
            .store(store_request("to edit", "s", ResponseLevel::Minimal))
            .await
            .unwrap();
        let id: Uuid = serde_json::from_value(stored["memory_id"].clone()).unwrap();

        let updated = service
            .update(UpdateRequest {
                memory_id: id,
                content: Some("edited".into()),
                scope: None,
                tags: Some(vec!["edited".into()]),
                category: None,
                metadata: None,
                preserve_associations: true,
                response_level: ResponseLevel::Full,
            })
            .await
            .unwrap();
        assert_eq!(updated["memory"]["content"], json!("edited"));

        let deleted = service
            .delete(DeleteRequest {
                memory_id: id,
                response_level: ResponseLevel::Minimal,
            })
            .await
            .unwrap();
        assert_eq!(deleted["deleted_id"], json!(id));
    }

    #[tokio::test]
    async fn test_move_reports_counts() {
        let (_dir, service) = service().await;
        let a = service
            .store(store_request("move a", "a/b", ResponseLevel::Minimal))
            .await
            .unwrap();
        let id: Uuid = serde_json::from_value(a["memory_id"].clone()).unwrap();

        let value = service
            .move_memories(MoveRequest {
                memory_ids: vec![id, Uuid::new_v4()],
                target_scope: "x/y".into(),
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(value["moved_count"], json!(1));
        assert_eq!(value["failed_count"], json!(1));
    }

    #[tokio::test]
    async fn test_list_all_pagination_shape() {
        let (_dir, service) = service().await;
        for i in 0..5 {
            service
                .store(store_request(&format!("memory {i}"), "s", ResponseLevel::Minimal))
                .await
                .unwrap();
        }
        let value = service
            .list_all(ListAllRequest {
                page: 1,
                per_page: 2,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(value["total_count"], json!(5));
        assert_eq!(value["memories"].as_array().unwrap().len(), 2);
        assert_eq!(value["pagination"]["total_pages"], json!(3));
        assert_eq!(value["pagination"]["has_next"], json!(true));
    }

    #[tokio::test]
    async fn test_list_scopes_with_counts() {
        let (_dir, service) = service().await;
        service
            .store(store_request("one", "work/projects/alpha", ResponseLevel::Minimal))
            .await
            .unwrap();
        service
            .store(store_request("two", "work/meetings", ResponseLevel::Minimal))
            .await
            .unwrap();

        let value = service
            .list_scopes(ListScopesRequest {
                parent_scope: Some("work".into()),
                include_memory_counts: true,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        let scopes = value["scopes"].as_array().unwrap();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.iter().all(|s| s.get("memory_count").is_some()));
    }

    #[tokio::test]
    async fn test_suggest_scope_shape() {
        let (_dir, service) = service().await;
        let value = service
            .suggest_scope(SuggestScopeRequest {
                content: "debugging the rest api error".into(),
                current_scope: None,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(value["suggested_scope"], json!("work/debugging"));
        assert!(value["confidence"].as_f64().unwrap() > 0.5);
        assert!(value.get("alternatives").is_some());
    }

    #[tokio::test]
    async fn test_session_manage_lifecycle() {
        let (_dir, service) = service().await;
        let created = service
            .session_manage(SessionManageRequest {
                action: SessionAction::Create,
                session_id: Some("svc-test".into()),
                max_age_days: None,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(created["session_id"], json!("svc-test"));

        let listed = service
            .session_manage(SessionManageRequest {
                action: SessionAction::List,
                session_id: None,
                max_age_days: None,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(listed["session_count"], json!(1));
    }

    #[tokio::test]
    async fn test_export_import_through_service() {
        let (_dir, svc) = service().await;
        svc
            .store(store_request("exported via service", "svc", ResponseLevel::Minimal))
            .await
            .unwrap();

        let exported = svc
            .export(ExportRequest {
                scope: None,
                include_associations: false,
                format: crate::export::ExportFormat::Json,
                file_path: None,
                compression: false,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(exported["exported_count"], json!(1));

        let (_dir2, fresh) = service().await;
        let imported = fresh
            .import(ImportRequest {
                file_path: None,
                import_data: Some(exported["export_data"].as_str().unwrap().to_string()),
                merge_strategy: crate::export::MergeStrategy::Overwrite,
                target_scope_prefix: None,
                validate_data: true,
                response_level: ResponseLevel::Standard,
            })
            .await
            .unwrap();
        assert_eq!(imported["imported_count"], json!(1));
        assert_eq!(imported["error_count"], json!(0));
    }
}
