//! Export and import of memories.
//!
//! The export payload is a versioned envelope carrying full memory records
//! (ids and timestamps included, so round-trips are lossless) and,
//! flag-controlled, the association edges among them. Payloads serialize
//! to JSON or YAML; compressed payloads are gzip then base64 so they stay
//! transport-safe inside JSON responses. Compressed files carry a one-line
//! header so import can tell them apart from plain text.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::MemoryEngine;
use crate::error::{MemoryError, Result};
use crate::model::{Association, Direction, Memory};
use crate::scope::{self, ScopeFilter};

/// Envelope format version written by this build.
pub const FORMAT_VERSION: &str = "1.0";
/// First line of a compressed export file.
const COMPRESSED_HEADER: &str = "# Compressed Memory Export (base64-encoded gzip)";

/// Serialization format for the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

/// How import treats records whose id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    SkipDuplicates,
    Overwrite,
    /// Import under a fresh id, leaving the existing record untouched.
    CreateVersions,
    /// Merge incoming metadata into the existing record, keeping its content.
    MergeMetadata,
}

/// The versioned export payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub format_version: String,
    pub export_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_filter: Option<String>,
    pub total_memories: usize,
    pub memories: Vec<Memory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associations: Option<Vec<Association>>,
}

/// Export inputs.
#[derive(Debug, Clone, Default)]
pub struct ExportParams {
    pub scope: Option<String>,
    pub include_associations: bool,
    pub format: ExportFormat,
    /// Write to this file instead of returning the payload inline.
    pub file_path: Option<String>,
    pub compression: bool,
}

/// Export outputs. Exactly one of `export_data` / `file_path` is set.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub export_data: Option<String>,
    pub file_path: Option<PathBuf>,
    pub exported_count: usize,
    pub compression_used: bool,
}

/// Import inputs. Exactly one of `file_path` / `import_data` must be set.
#[derive(Debug, Clone, Default)]
pub struct ImportParams {
    pub file_path: Option<String>,
    pub import_data: Option<String>,
    pub merge_strategy: MergeStrategy,
    /// Re-root every imported scope under this prefix.
    pub target_scope_prefix: Option<String>,
    pub validate_data: bool,
}

/// Import outputs.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
    pub imported_scopes: Vec<String>,
}

// ---------------------------------------------------------------------
// export
// ---------------------------------------------------------------------

/// Export memories matching the scope (subtree semantics) or everything.
pub async fn export_memories(
    engine: &Arc<MemoryEngine>,
    params: ExportParams,
) -> Result<ExportOutcome> {
    if let Some(scope) = &params.scope {
        scope::validate(scope)?;
    }
    let filter = match &params.scope {
        Some(s) => ScopeFilter::Subtree(s.clone()),
        None => ScopeFilter::All,
    };
    let memories = engine.metadata_store().list(&filter, usize::MAX, 0).await;

    let associations = if params.include_associations {
        let exported: HashSet<Uuid> = memories.iter().map(|m| m.id).collect();
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for memory in &memories {
            for edge in engine
                .association_graph()
                .edges_of(memory.id, Direction::Out, 0.0)
                .await
            {
                if exported.contains(&edge.target_id)
                    && seen.insert((
                        edge.source_id,
                        edge.target_id,
                        edge.association_type.clone(),
                    ))
                {
                    edges.push(edge);
                }
            }
        }
        Some(edges)
    } else {
        None
    };

    let envelope = ExportEnvelope {
        format_version: FORMAT_VERSION.to_string(),
        export_timestamp: Utc::now(),
        scope_filter: params.scope.clone(),
        total_memories: memories.len(),
        memories,
        associations,
    };

    let serialized = match params.format {
        ExportFormat::Json => serde_json::to_string_pretty(&envelope)?,
        ExportFormat::Yaml => serde_yaml::to_string(&envelope)
            .map_err(|e| MemoryError::Internal(format!("yaml serialization failed: {e}")))?,
    };

    let (payload, compression_used) = if params.compression {
        (compress(&serialized)?, true)
    } else {
        (serialized, false)
    };

    let exported_count = envelope.total_memories;
    match &params.file_path {
        Some(file_path) => {
            let path = resolve_export_path(engine, file_path)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = if compression_used {
                format!("{COMPRESSED_HEADER}\n{payload}")
            } else {
                payload
            };
            std::fs::write(&path, contents)?;
            info!(count = exported_count, path = %path.display(), "Exported memories to file");
            Ok(ExportOutcome {
                export_data: None,
                file_path: Some(path),
                exported_count,
                compression_used,
            })
        }
        None => {
            info!(count = exported_count, "Exported memories inline");
            Ok(ExportOutcome {
                export_data: Some(payload),
                file_path: None,
                exported_count,
                compression_used,
            })
        }
    }
}

// ---------------------------------------------------------------------
// import
// ---------------------------------------------------------------------

/// Import memories from a file or an inline payload.
pub async fn import_memories(
    engine: &Arc<MemoryEngine>,
    params: ImportParams,
) -> Result<ImportOutcome> {
    let raw = load_import_payload(engine, &params)?;
    let envelope = parse_envelope(&raw)?;

    let mut outcome = ImportOutcome::default();
    if params.validate_data {
        let errors = validate_envelope(&envelope);
        if !errors.is_empty() {
            return Err(MemoryError::Validation(format!(
                "import data failed validation: {}",
                errors.join("; ")
            )));
        }
    }

    // Fresh-id mapping so re-rooted association edges stay connected when
    // create_versions mints new ids.
    let mut id_map: std::collections::HashMap<Uuid, Uuid> = std::collections::HashMap::new();
    let mut scopes = HashSet::new();

    for mut memory in envelope.memories {
        let original_id = memory.id;
        if let Some(prefix) = &params.target_scope_prefix {
            let rerooted = format!("{}/{}", prefix.trim_end_matches('/'), memory.scope);
            if let Err(e) = scope::validate(&rerooted) {
                outcome.error_count += 1;
                outcome.errors.push(format!("memory {original_id}: {e}"));
                continue;
            }
            memory.scope = rerooted;
            memory.sync_scope_metadata();
        }

        let exists = engine.metadata_store().contains(memory.id).await;
        let result = match (exists, params.merge_strategy) {
            (true, MergeStrategy::SkipDuplicates) => {
                outcome.skipped_count += 1;
                continue;
            }
            (true, MergeStrategy::CreateVersions) => {
                memory.id = Uuid::new_v4();
                id_map.insert(original_id, memory.id);
                engine.restore(memory.clone()).await.map(|_| ())
            }
            (true, MergeStrategy::MergeMetadata) => {
                match engine.metadata_store().get(original_id).await {
                    Some(mut existing) => {
                        existing.metadata.extend(memory.metadata.clone());
                        existing.sync_scope_metadata();
                        existing.updated_at = Utc::now();
                        engine.metadata_store().update(existing).await
                    }
                    None => Err(MemoryError::NotFound(original_id)),
                }
            }
            // Overwrite, or any strategy on a fresh id
            _ => engine.restore(memory.clone()).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                outcome.imported_count += 1;
                scopes.insert(memory.scope.clone());
            }
            Err(e) => {
                warn!(memory_id = %original_id, error = %e, "Failed to import memory");
                outcome.error_count += 1;
                outcome.errors.push(format!("memory {original_id}: {e}"));
            }
        }
    }

    if let Some(associations) = envelope.associations {
        for edge in associations {
            let source = *id_map.get(&edge.source_id).unwrap_or(&edge.source_id);
            let target = *id_map.get(&edge.target_id).unwrap_or(&edge.target_id);
            let both_present = engine.metadata_store().contains(source).await
                && engine.metadata_store().contains(target).await;
            if both_present {
                let _ = engine
                    .association_graph()
                    .add_edge(
                        source,
                        target,
                        &edge.association_type,
                        edge.strength,
                        edge.auto_generated,
                    )
                    .await;
            }
        }
    }

    outcome.imported_scopes = scopes.into_iter().collect();
    outcome.imported_scopes.sort();
    info!(
        imported = outcome.imported_count,
        skipped = outcome.skipped_count,
        errors = outcome.error_count,
        "Import completed"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------

fn compress(data: &str) -> Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
}

fn decompress(data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| MemoryError::Validation(format!("invalid base64 payload: {e}")))?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut out = String::new();
    decoder.read_to_string(&mut out)?;
    Ok(out)
}

fn load_import_payload(engine: &Arc<MemoryEngine>, params: &ImportParams) -> Result<String> {
    let raw = match (&params.file_path, &params.import_data) {
        (Some(file_path), _) => {
            let path = resolve_import_path(engine, file_path)?;
            if !path.exists() {
                return Err(MemoryError::Validation(format!(
                    "import file not found: {}",
                    path.display()
                )));
            }
            let max_bytes = engine.config().storage.max_import_size_mb * 1024 * 1024;
            let size = std::fs::metadata(&path)?.len();
            if size > max_bytes {
                return Err(MemoryError::Validation(format!(
                    "import file is {size} bytes, limit is {max_bytes}"
                )));
            }
            std::fs::read_to_string(&path)?
        }
        (None, Some(data)) => data.clone(),
        (None, None) => {
            return Err(MemoryError::Validation(
                "either file_path or import_data must be provided".into(),
            ))
        }
    };

    // Compressed files announce themselves with a header line; inline
    // payloads that don't parse as a document are treated as base64 gzip.
    if let Some(rest) = raw.strip_prefix(COMPRESSED_HEADER) {
        return decompress(rest);
    }
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with("format_version") {
        if let Ok(decompressed) = decompress(&raw) {
            return Ok(decompressed);
        }
    }
    Ok(raw)
}

fn parse_envelope(raw: &str) -> Result<ExportEnvelope> {
    match serde_json::from_str(raw) {
        Ok(envelope) => Ok(envelope),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            MemoryError::Validation(format!(
                "payload is neither valid JSON ({json_err}) nor YAML ({yaml_err})"
            ))
        }),
    }
}

fn validate_envelope(envelope: &ExportEnvelope) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, memory) in envelope.memories.iter().enumerate() {
        if memory.content.trim().is_empty() {
            errors.push(format!("memory {i}: content is empty"));
        }
        if let Err(e) = scope::validate(&memory.scope) {
            errors.push(format!("memory {i}: {e}"));
        }
    }
    errors
}

fn resolve_export_path(engine: &Arc<MemoryEngine>, file_path: &str) -> Result<PathBuf> {
    let storage = &engine.config().storage;
    resolve_path(file_path, storage.allow_absolute_paths, || {
        storage.data_dir.join(&storage.export_dir)
    })
}

fn resolve_import_path(engine: &Arc<MemoryEngine>, file_path: &str) -> Result<PathBuf> {
    let storage = &engine.config().storage;
    let path = PathBuf::from(file_path);
    if path.is_absolute() {
        return resolve_path(file_path, storage.allow_absolute_paths, PathBuf::new);
    }
    // Relative paths: the import directory first, then exports.
    let import_path = storage.data_dir.join(&storage.import_dir).join(&path);
    if import_path.exists() {
        return Ok(import_path);
    }
    let export_path = storage.data_dir.join(&storage.export_dir).join(&path);
    if export_path.exists() {
        return Ok(export_path);
    }
    Ok(import_path)
}

fn resolve_path(
    file_path: &str,
    allow_absolute: bool,
    base: impl FnOnce() -> PathBuf,
) -> Result<PathBuf> {
    let path = PathBuf::from(file_path);
    if path.is_absolute() {
        if !allow_absolute {
            return Err(MemoryError::Validation(
                "absolute paths are disabled by configuration".into(),
            ));
        }
        Ok(path)
    } else {
        Ok(base().join(path))
    }
}
