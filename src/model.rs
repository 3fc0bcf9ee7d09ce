//! Core data model: memories and associations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single stored memory.
///
/// The metadata store owns this record; the vector index and association
/// graph reference it by id only. The embedding is intentionally absent:
/// it lives in the vector index and is derived, not durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub scope: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Caller-supplied metadata. The scope is mirrored here under the
    /// `scope` key on every write (legacy consumers read it from there).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
}

impl Memory {
    /// Build a fresh memory with a new id and current timestamps.
    ///
    /// Tags are trimmed, de-duplicated (insertion order kept) and empty
    /// entries dropped. The scope is mirrored into `metadata.scope`.
    pub fn new(
        content: String,
        scope: String,
        tags: Vec<String>,
        category: Option<String>,
        mut metadata: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        metadata.insert("scope".to_string(), serde_json::Value::String(scope.clone()));
        Self {
            id: Uuid::new_v4(),
            content,
            scope,
            tags: normalize_tags(tags),
            category,
            metadata,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
        }
    }

    /// Keep the redundant `metadata.scope` mirror in sync after a move.
    pub fn sync_scope_metadata(&mut self) {
        self.metadata.insert(
            "scope".to_string(),
            serde_json::Value::String(self.scope.clone()),
        );
    }

    /// Content preview truncated at `max_chars`, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_preview(&self.content, max_chars)
    }
}

/// Truncate on a char boundary and append `...` when anything was cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Normalize a tag list: trim, drop empties, coalesce duplicates.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Direction selector for edge queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Both,
}

/// A directed, typed, weighted edge between two memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub association_type: String,
    /// Strength in [0, 1].
    pub strength: f32,
    pub auto_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// A memory paired with the similarity score that retrieved it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_memory_mirrors_scope_into_metadata() {
        let m = Memory::new(
            "hello".into(),
            "work/notes".into(),
            vec![],
            None,
            BTreeMap::new(),
        );
        assert_eq!(
            m.metadata.get("scope"),
            Some(&serde_json::Value::String("work/notes".into()))
        );
        assert_eq!(m.access_count, 0);
        assert_eq!(m.created_at, m.updated_at);
    }

    #[test]
    fn test_tag_normalization() {
        let m = Memory::new(
            "x".into(),
            "a".into(),
            vec![
                " rust ".into(),
                "rust".into(),
                "".into(),
                "   ".into(),
                "async".into(),
            ],
            None,
            BTreeMap::new(),
        );
        assert_eq!(m.tags, vec!["rust".to_string(), "async".to_string()]);
    }

    #[test]
    fn test_preview_truncation() {
        assert_eq!(truncate_preview("short", 100), "short");
        let long = "a".repeat(150);
        let preview = truncate_preview(&long, 100);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_preview_multibyte_boundary() {
        // 5 multibyte chars, cut at 3; must not split a char
        let preview = truncate_preview("日本語記憶", 3);
        assert_eq!(preview, "日本語...");
    }

    #[test]
    fn test_serde_roundtrip_preserves_fields() {
        let mut metadata = BTreeMap::new();
        metadata.insert("k".to_string(), serde_json::json!({"nested": 1}));
        let m = Memory::new(
            "content".into(),
            "a/b".into(),
            vec!["t1".into()],
            Some("cat".into()),
            metadata,
        );
        let json = serde_json::to_string(&m).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
