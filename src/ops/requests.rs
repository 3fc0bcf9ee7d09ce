//! Typed request records for every operation.
//!
//! The framing layer converts wire payloads into these records or rejects
//! them; nothing here accepts loosely typed maps. Each record validates its
//! own ranges so an invalid request never reaches the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::export::{ExportFormat, MergeStrategy};
use crate::response::ResponseLevel;
use crate::search::MAX_SEARCH_LIMIT;

fn default_limit() -> usize {
    10
}
fn default_similarity_threshold() -> f32 {
    0.5
}
fn default_duplicate_threshold() -> f32 {
    0.95
}
fn default_diversity_threshold() -> f32 {
    0.8
}
fn default_expansion_factor() -> f32 {
    3.0
}
fn default_max_expansion_factor() -> f32 {
    10.0
}
fn default_page() -> usize {
    1
}
fn default_per_page() -> usize {
    10
}
fn default_true() -> bool {
    true
}

fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MemoryError::Validation(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(MemoryError::Validation(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

/// store: create a memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub content: String,
    pub scope: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

impl StoreRequest {
    pub fn validate(&self) -> Result<()> {
        check_unit_range("duplicate_threshold", self.duplicate_threshold)
    }
}

/// search: semantic search with scope-aware fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub include_child_scopes: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub include_associations: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<()> {
        check_limit(self.limit)?;
        check_unit_range("similarity_threshold", self.similarity_threshold)
    }
}

/// diversified_search: relevance with mutual dissimilarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversifiedSearchRequest {
    pub query: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub include_child_scopes: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub min_score: f32,
    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f32,
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: f32,
    #[serde(default = "default_max_expansion_factor")]
    pub max_expansion_factor: f32,
    #[serde(default)]
    pub include_associations: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

impl DiversifiedSearchRequest {
    pub fn validate(&self) -> Result<()> {
        check_limit(self.limit)?;
        check_unit_range("min_score", self.min_score)?;
        check_unit_range("diversity_threshold", self.diversity_threshold)?;
        if !(1.0..=10.0).contains(&self.expansion_factor) {
            return Err(MemoryError::Validation(format!(
                "expansion_factor must be in [1, 10], got {}",
                self.expansion_factor
            )));
        }
        if !(1.0..=20.0).contains(&self.max_expansion_factor)
            || self.max_expansion_factor < self.expansion_factor
        {
            return Err(MemoryError::Validation(format!(
                "max_expansion_factor must be in [1, 20] and >= expansion_factor, got {}",
                self.max_expansion_factor
            )));
        }
        Ok(())
    }
}

/// get: fetch one memory by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub memory_id: Uuid,
    #[serde(default = "default_true")]
    pub include_associations: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// update: field-by-field mutation; `None` leaves a field unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub memory_id: Uuid,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default = "default_true")]
    pub preserve_associations: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// delete: remove one memory everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub memory_id: Uuid,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// move: batch scope change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub memory_ids: Vec<Uuid>,
    pub target_scope: String,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// discover_associations: find related memories across scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverAssociationsRequest {
    pub memory_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

impl DiscoverAssociationsRequest {
    pub fn validate(&self) -> Result<()> {
        check_limit(self.limit)?;
        check_unit_range("similarity_threshold", self.similarity_threshold)
    }
}

/// list_all: paginated dump, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAllRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

impl ListAllRequest {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(MemoryError::Validation("page must be >= 1".into()));
        }
        if self.per_page == 0 || self.per_page > MAX_SEARCH_LIMIT {
            return Err(MemoryError::Validation(format!(
                "per_page must be between 1 and {MAX_SEARCH_LIMIT}, got {}",
                self.per_page
            )));
        }
        Ok(())
    }
}

/// list_scopes: scope inventory, optionally restricted to one parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListScopesRequest {
    #[serde(default)]
    pub parent_scope: Option<String>,
    #[serde(default)]
    pub include_memory_counts: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// suggest_scope: keyword heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestScopeRequest {
    pub content: String,
    #[serde(default)]
    pub current_scope: Option<String>,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// session_manage actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Create,
    List,
    Cleanup,
}

/// session_manage: create/list/cleanup session scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManageRequest {
    pub action: SessionAction,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub max_age_days: Option<i64>,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// export: serialize memories to a payload or file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub include_associations: bool,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub compression: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}

/// import: load memories from a payload or file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub import_data: Option<String>,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub target_scope_prefix: Option<String>,
    #[serde(default = "default_true")]
    pub validate_data: bool,
    #[serde(default)]
    pub response_level: ResponseLevel,
}
