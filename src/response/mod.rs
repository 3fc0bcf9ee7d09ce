//! Three-tier response shaping.
//!
//! Every operation produces a full result record; the shaper projects it to
//! the level the caller asked for and prunes the payload so responses stay
//! small:
//! - `minimal`: success flag, primary ids, counts, a short message.
//! - `standard`: adds scopes, content previews (100 chars; 50 in
//!   association listings), similarity scores, pagination.
//! - `full`: complete records including metadata, tags, timestamps and
//!   diagnostics.
//!
//! Null fields and empty lists/maps are removed entirely rather than
//! emitted, and previews append `...` after the cut.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::MemoryError;
use crate::model::{truncate_preview, Association, Memory};

/// Preview length for memory content at the `standard` level.
pub const PREVIEW_CHARS: usize = 100;
/// Preview length inside association listings.
pub const ASSOCIATION_PREVIEW_CHARS: usize = 50;

/// How much of each record a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLevel {
    Minimal,
    #[default]
    Standard,
    Full,
}

impl std::str::FromStr for ResponseLevel {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ResponseLevel::Minimal),
            "standard" => Ok(ResponseLevel::Standard),
            "full" => Ok(ResponseLevel::Full),
            other => Err(MemoryError::Validation(format!(
                "unknown response level '{other}'"
            ))),
        }
    }
}

/// Remove nulls and empty collections, recursively. Arrays and maps that
/// become empty after their children are pruned are removed as well.
pub fn prune(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for v in map.values_mut() {
                prune(v);
            }
            map.retain(|_, v| !is_removable(v));
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                prune(v);
            }
            items.retain(|v| !is_removable(v));
        }
        _ => {}
    }
}

fn is_removable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Project a memory record at the given level.
///
/// `score` attaches a similarity score for search results; pass `None`
/// elsewhere. At `minimal` only the id survives.
pub fn memory_json(memory: &Memory, level: ResponseLevel, score: Option<f32>) -> Value {
    let mut out = match level {
        ResponseLevel::Minimal => json!({ "memory_id": memory.id }),
        ResponseLevel::Standard => json!({
            "memory_id": memory.id,
            "scope": memory.scope,
            "content": memory.preview(PREVIEW_CHARS),
        }),
        ResponseLevel::Full => json!({
            "memory_id": memory.id,
            "content": memory.content,
            "scope": memory.scope,
            "tags": memory.tags,
            "category": memory.category,
            "metadata": memory.metadata,
            "created_at": memory.created_at,
            "updated_at": memory.updated_at,
            "accessed_at": memory.accessed_at,
            "access_count": memory.access_count,
        }),
    };
    if let Some(score) = score {
        if level != ResponseLevel::Minimal {
            out["similarity_score"] = json!(score);
        }
    }
    out
}

/// Project an association edge at the given level.
pub fn association_json(association: &Association, level: ResponseLevel) -> Value {
    match level {
        ResponseLevel::Minimal => json!({
            "source_id": association.source_id,
            "target_id": association.target_id,
        }),
        ResponseLevel::Standard => json!({
            "source_id": association.source_id,
            "target_id": association.target_id,
            "association_type": association.association_type,
            "strength": association.strength,
        }),
        ResponseLevel::Full => json!({
            "source_id": association.source_id,
            "target_id": association.target_id,
            "association_type": association.association_type,
            "strength": association.strength,
            "auto_generated": association.auto_generated,
            "created_at": association.created_at,
        }),
    }
}

/// Assemble a success envelope: the `message` is always present, the rest
/// of the payload merges in, and the whole thing is pruned.
pub fn success_response(message: &str, mut payload: Map<String, Value>) -> Value {
    payload.insert("success".into(), Value::Bool(true));
    payload.insert("message".into(), Value::String(message.to_string()));
    let mut out = Value::Object(payload);
    prune(&mut out);
    out
}

/// Shape an error through the same three levels. `minimal` carries only the
/// flag and message; `full` adds the error kind and retryability.
pub fn error_response(error: &MemoryError, level: ResponseLevel) -> Value {
    let mut out = match level {
        ResponseLevel::Minimal => json!({
            "success": false,
            "message": error.to_string(),
        }),
        ResponseLevel::Standard => json!({
            "success": false,
            "message": error.to_string(),
            "error": error.kind(),
        }),
        ResponseLevel::Full => json!({
            "success": false,
            "message": error.to_string(),
            "error": error.kind(),
            "retryable": error.is_retryable(),
        }),
    };
    prune(&mut out);
    out
}

/// Pagination block attached to list responses at `standard` and above.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(page: usize, per_page: usize, total_items: usize) -> Self {
        let total_pages = total_items.div_ceil(per_page.max(1));
        Self {
            page,
            per_page,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

/// Association-listing preview: shorter than the memory preview.
pub fn association_preview(content: &str) -> String {
    truncate_preview(content, ASSOCIATION_PREVIEW_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_memory() -> Memory {
        Memory::new(
            "a".repeat(150),
            "work/notes".into(),
            vec!["tag1".into()],
            Some("cat".into()),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_prune_removes_null_and_empty() {
        let mut value = json!({
            "keep": 1,
            "empty_list": [],
            "null_field": null,
            "nested": { "also_null": null },
            "false_flag": false,
            "empty_string": "",
        });
        prune(&mut value);
        let map = value.as_object().unwrap();
        assert!(map.contains_key("keep"));
        assert!(map.contains_key("false_flag"), "booleans survive");
        assert!(map.contains_key("empty_string"), "empty strings survive");
        assert!(!map.contains_key("empty_list"));
        assert!(!map.contains_key("null_field"));
        assert!(
            !map.contains_key("nested"),
            "objects emptied by pruning are removed"
        );
    }

    #[test]
    fn test_memory_json_minimal_has_id_only() {
        let memory = sample_memory();
        let value = memory_json(&memory, ResponseLevel::Minimal, Some(0.9));
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("memory_id"));
    }

    #[test]
    fn test_memory_json_standard_truncates_preview() {
        let memory = sample_memory();
        let value = memory_json(&memory, ResponseLevel::Standard, Some(0.75));
        let content = value["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), PREVIEW_CHARS + 3);
        assert!(content.ends_with("..."));
        assert_eq!(value["similarity_score"], json!(0.75));
        assert!(value.get("metadata").is_none(), "standard omits metadata");
    }

    #[test]
    fn test_memory_json_full_is_complete() {
        let memory = sample_memory();
        let value = memory_json(&memory, ResponseLevel::Full, None);
        assert_eq!(value["content"].as_str().unwrap().len(), 150);
        assert!(value.get("tags").is_some());
        assert!(value.get("created_at").is_some());
        assert!(value.get("access_count").is_some());
        assert!(value.get("similarity_score").is_none());
    }

    #[test]
    fn test_error_response_levels() {
        let err = MemoryError::Overloaded;
        let minimal = error_response(&err, ResponseLevel::Minimal);
        assert_eq!(minimal["success"], json!(false));
        assert!(minimal.get("error").is_none());

        let full = error_response(&err, ResponseLevel::Full);
        assert_eq!(full["error"], json!("overloaded"));
        assert_eq!(full["retryable"], json!(true));
    }

    #[test]
    fn test_success_response_prunes_payload() {
        let mut payload = Map::new();
        payload.insert("results".into(), json!([]));
        payload.insert("count".into(), json!(0));
        let value = success_response("done", payload);
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!("done"));
        assert!(value.get("results").is_none(), "empty list pruned");
        assert_eq!(value["count"], json!(0), "zero is not empty");
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);
        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next);
        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);
    }

    #[test]
    fn test_response_level_parse() {
        assert_eq!(
            "minimal".parse::<ResponseLevel>().unwrap(),
            ResponseLevel::Minimal
        );
        assert_eq!(
            "full".parse::<ResponseLevel>().unwrap(),
            ResponseLevel::Full
        );
        assert!("verbose".parse::<ResponseLevel>().is_err());
    }

    #[test]
    fn test_association_preview_length() {
        let long = "x".repeat(80);
        let preview = association_preview(&long);
        assert_eq!(preview.chars().count(), ASSOCIATION_PREVIEW_CHARS + 3);
    }
}
