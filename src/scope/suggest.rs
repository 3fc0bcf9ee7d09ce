//! Keyword-driven scope suggestion.
//!
//! Deterministic: lowercased content is matched against a fixed keyword
//! table; each matching rule yields a recommendation with a confidence score
//! and a one-line reasoning. The highest-confidence rule wins; the rest are
//! returned as alternatives. With no match, the current scope's top-level
//! family (if any) is suggested at low confidence, else `user/default`.

use serde::{Deserialize, Serialize};

/// A single scope recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeRecommendation {
    pub scope: String,
    pub confidence: f32,
    pub reasoning: String,
}

/// Keyword rules, checked in order. Confidence ties keep table order.
const RULES: &[(&[&str], &str, f32, &str)] = &[
    (
        &["python", "javascript", "typescript", "java", "c++", "rust", "golang"],
        "learning/programming",
        0.9,
        "Programming language mentioned",
    ),
    (
        &["api", "rest", "graphql", "endpoint", "http"],
        "learning/api-design",
        0.8,
        "API-related content detected",
    ),
    (
        &["meeting", "standup", "retrospective", "planning"],
        "work/meetings",
        0.9,
        "Meeting-related content",
    ),
    (
        &["project", "deadline", "milestone", "task"],
        "work/projects",
        0.8,
        "Project management content",
    ),
    (
        &["bug", "issue", "error", "debug", "fix"],
        "work/debugging",
        0.85,
        "Debugging or issue resolution",
    ),
    (
        &["personal", "private", "diary", "journal"],
        "personal/thoughts",
        0.9,
        "Personal content detected",
    ),
    (
        &["idea", "innovation", "brainstorm", "concept"],
        "personal/ideas",
        0.8,
        "Creative or idea content",
    ),
    (
        &["learn", "study", "tutorial", "course", "training"],
        "learning/general",
        0.8,
        "Learning-related content",
    ),
];

/// Suggest a scope for `content`, optionally biased by `current_scope`.
///
/// Returns the primary recommendation and up to four alternatives, ordered
/// by descending confidence.
pub fn suggest_scope(
    content: &str,
    current_scope: Option<&str>,
) -> (ScopeRecommendation, Vec<ScopeRecommendation>) {
    let lower = content.to_lowercase();
    let mut suggestions: Vec<ScopeRecommendation> = RULES
        .iter()
        .filter(|(keywords, _, _, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, scope, confidence, reasoning)| ScopeRecommendation {
            scope: scope.to_string(),
            confidence: *confidence,
            reasoning: reasoning.to_string(),
        })
        .collect();

    // Contextual fallback: stay inside the caller's top-level family when no
    // rule already points there.
    if let Some(current) = current_scope {
        for family in ["work", "learning", "personal"] {
            let prefix = format!("{family}/");
            if (current == family || current.starts_with(&prefix))
                && !suggestions.iter().any(|s| s.scope.starts_with(&prefix))
            {
                suggestions.push(ScopeRecommendation {
                    scope: format!("{family}/general"),
                    confidence: 0.6,
                    reasoning: format!("Contextual suggestion based on current {family} scope"),
                });
            }
        }
    }

    if suggestions.is_empty() {
        let fallback = current_scope.map(|s| s.to_string());
        suggestions.push(ScopeRecommendation {
            scope: fallback.unwrap_or_else(|| "user/default".to_string()),
            confidence: 0.5,
            reasoning: "Default scope for unclassified content".to_string(),
        });
    }

    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let primary = suggestions.remove(0);
    suggestions.truncate(4);
    (primary, suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programming_keyword_wins() {
        let (primary, _) = suggest_scope("Notes on Rust ownership and borrowing", None);
        assert_eq!(primary.scope, "learning/programming");
        assert!(primary.confidence >= 0.9);
    }

    #[test]
    fn test_meeting_content() {
        let (primary, _) = suggest_scope("Standup notes from Tuesday", None);
        assert_eq!(primary.scope, "work/meetings");
    }

    #[test]
    fn test_multiple_matches_sorted_by_confidence() {
        // "debug" (0.85) and "api" (0.8) both fire; debugging must rank first.
        let (primary, alternatives) = suggest_scope("debug the REST api error", None);
        assert_eq!(primary.scope, "work/debugging");
        assert!(alternatives.iter().any(|a| a.scope == "learning/api-design"));
    }

    #[test]
    fn test_no_match_falls_back_to_current_scope() {
        let (primary, _) = suggest_scope("zzz qqq unclassifiable", Some("hobby/cooking"));
        assert_eq!(primary.scope, "hobby/cooking");
        assert!(primary.confidence <= 0.5);
    }

    #[test]
    fn test_no_match_no_current_scope_defaults() {
        let (primary, alternatives) = suggest_scope("zzz qqq unclassifiable", None);
        assert_eq!(primary.scope, "user/default");
        assert_eq!(primary.confidence, 0.5);
        assert!(alternatives.is_empty());
    }

    #[test]
    fn test_work_context_adds_contextual_suggestion() {
        let (_, alternatives) = suggest_scope("learn some python", Some("work/projects"));
        // Python fires learning/programming as primary; the work context
        // should still surface work/general as an alternative.
        assert!(alternatives.iter().any(|a| a.scope == "work/general"));
    }

    #[test]
    fn test_deterministic() {
        let a = suggest_scope("python tutorial", Some("learning/rust"));
        let b = suggest_scope("python tutorial", Some("learning/rust"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_alternatives_capped() {
        let (_, alternatives) = suggest_scope(
            "python api meeting project bug personal idea learn tutorial",
            Some("work/x"),
        );
        assert!(alternatives.len() <= 4);
    }
}
