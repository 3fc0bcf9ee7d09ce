//! Configuration loading and defaults.
//!
//! Config lives at `~/.mnemon/config.toml`. Every field has a serde default
//! so a missing or partial file always produces a runnable configuration.
//! Thresholds that the engine tunes at runtime (duplicate suppression,
//! auto-association) are configuration rather than constants so operators
//! can adjust them without a rebuild.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// On-disk layout and size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory; relative paths in the other fields resolve against it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Subdirectory for export files.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// Subdirectory searched first when importing by relative path.
    #[serde(default = "default_import_dir")]
    pub import_dir: String,
    /// Reject import payloads larger than this many megabytes.
    #[serde(default = "default_max_import_size_mb")]
    pub max_import_size_mb: u64,
    /// Allow absolute file paths in export/import requests.
    #[serde(default)]
    pub allow_absolute_paths: bool,
    /// Persist the association graph every N edge writes.
    #[serde(default = "default_graph_flush_every")]
    pub graph_flush_every: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: default_export_dir(),
            import_dir: default_import_dir(),
            max_import_size_mb: default_max_import_size_mb(),
            allow_absolute_paths: false,
            graph_flush_every: default_graph_flush_every(),
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic hashed bag-of-words vectors; no external model.
    #[default]
    Hash,
    /// No embedder; stores proceed without vectors, search degrades to tags.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Vector dimension, fixed for the process lifetime.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Embedding cache capacity (entries).
    #[serde(default = "default_embedding_cache_size")]
    pub cache_size: usize,
    /// Embedding cache TTL in seconds.
    #[serde(default = "default_embedding_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            dimension: default_dimension(),
            cache_size: default_embedding_cache_size(),
            cache_ttl_secs: default_embedding_cache_ttl(),
        }
    }
}

/// Engine-level tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cosine similarity at or above which a store is a duplicate.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,
    /// Run auto-association after successful stores.
    #[serde(default = "default_true")]
    pub auto_associate: bool,
    /// Minimum similarity for an auto-generated edge.
    #[serde(default = "default_auto_associate_threshold")]
    pub auto_associate_threshold: f32,
    /// Candidate fan-out for auto-association queries.
    #[serde(default = "default_auto_associate_limit")]
    pub auto_associate_limit: usize,
    /// Edge type tag applied to auto-generated associations.
    #[serde(default = "default_auto_associate_type")]
    pub auto_associate_type: String,
    /// By-id memory cache capacity (entries).
    #[serde(default = "default_memory_cache_size")]
    pub memory_cache_size: usize,
    /// Maximum concurrently executing engine operations before Overloaded.
    #[serde(default = "default_max_concurrent_ops")]
    pub max_concurrent_ops: usize,
    /// Interval between background reconcile passes, in seconds.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: default_duplicate_threshold(),
            auto_associate: true,
            auto_associate_threshold: default_auto_associate_threshold(),
            auto_associate_limit: default_auto_associate_limit(),
            auto_associate_type: default_auto_associate_type(),
            memory_cache_size: default_memory_cache_size(),
            max_concurrent_ops: default_max_concurrent_ops(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

/// Search defaults applied when requests omit the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    #[serde(default = "default_min_score")]
    pub default_min_score: f32,
    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f32,
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: f32,
    #[serde(default = "default_max_expansion_factor")]
    pub max_expansion_factor: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            default_min_score: default_min_score(),
            diversity_threshold: default_diversity_threshold(),
            expansion_factor: default_expansion_factor(),
            max_expansion_factor: default_max_expansion_factor(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    Config::dir().join("data")
}
fn default_export_dir() -> String {
    "exports".to_string()
}
fn default_import_dir() -> String {
    "imports".to_string()
}
fn default_max_import_size_mb() -> u64 {
    100
}
fn default_graph_flush_every() -> usize {
    32
}
fn default_dimension() -> usize {
    384
}
fn default_embedding_cache_size() -> usize {
    1000
}
fn default_embedding_cache_ttl() -> u64 {
    3600
}
fn default_duplicate_threshold() -> f32 {
    0.95
}
fn default_auto_associate_threshold() -> f32 {
    0.7
}
fn default_auto_associate_limit() -> usize {
    10
}
fn default_auto_associate_type() -> String {
    "semantic".to_string()
}
fn default_memory_cache_size() -> usize {
    1000
}
fn default_max_concurrent_ops() -> usize {
    64
}
fn default_reconcile_interval() -> u64 {
    300
}
fn default_search_limit() -> usize {
    10
}
fn default_min_score() -> f32 {
    0.5
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
fn default_true() -> bool {
    true
}

impl Config {
    /// Base directory for all mnemon state (`~/.mnemon`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemon")
    }

    /// Default config file path (`~/.mnemon/config.toml`).
    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load config from the default path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and parse a config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| MemoryError::Validation(format!("invalid config at {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_runnable() {
        let config = Config::default();
        assert_eq!(config.engine.duplicate_threshold, 0.95);
        assert_eq!(config.engine.auto_associate_threshold, 0.7);
        assert_eq!(config.engine.auto_associate_limit, 10);
        assert_eq!(config.engine.auto_associate_type, "semantic");
        assert!(config.engine.auto_associate);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.search.default_limit, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let raw = r#"
            [engine]
            duplicate_threshold = 0.9

            [embedding]
            backend = "none"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.engine.duplicate_threshold, 0.9);
        assert_eq!(config.embedding.backend, EmbeddingBackend::None);
        // Untouched sections keep their defaults
        assert_eq!(config.engine.auto_associate_limit, 10);
        assert_eq!(config.search.diversity_threshold, 0.8);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(!path.exists());
        // load_from_path on missing file errors; Config::load falls back,
        // which we emulate here.
        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
