//! Session management over `session/<id>` scopes.
//!
//! Sessions are a naming convention, not an identity system: creating one
//! stores a marker memory in the session scope, listing aggregates every
//! scope under `session/`, and cleanup deletes session memories past an
//! age cutoff through the engine so vectors and edges cascade.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::{MemoryEngine, StoreParams};
use crate::error::{MemoryError, Result};
use crate::scope::{self, ScopeFilter};

/// Default cleanup cutoff when the caller does not give one.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Summary of one session scope.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub scope: String,
    pub memory_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Result of a cleanup pass.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub cleaned_memories: usize,
    pub cleaned_sessions: Vec<String>,
}

/// Create a session scope with a marker memory.
///
/// A missing `session_id` gets a timestamp-derived one. The id must form a
/// valid scope segment.
pub async fn create_session(
    engine: &std::sync::Arc<MemoryEngine>,
    session_id: Option<String>,
) -> Result<SessionInfo> {
    let session_id = session_id
        .unwrap_or_else(|| format!("session-{}", Utc::now().format("%Y%m%d-%H%M%S")));
    let session_scope = format!("session/{session_id}");
    scope::validate(&session_scope)?;

    let mut metadata = BTreeMap::new();
    metadata.insert("session_marker".to_string(), serde_json::Value::Bool(true));
    let outcome = engine
        .store(StoreParams {
            content: format!("Session created: {session_id}"),
            scope: session_scope.clone(),
            tags: vec!["session".into()],
            category: None,
            metadata,
            allow_duplicates: true,
            duplicate_threshold: None,
        })
        .await?;

    info!(session_id = %session_id, "Session created");
    Ok(SessionInfo {
        session_id,
        scope: session_scope,
        memory_count: 1,
        created_at: outcome.memory.created_at,
        last_activity: outcome.memory.created_at,
    })
}

/// List active sessions, newest activity first.
pub async fn list_sessions(engine: &std::sync::Arc<MemoryEngine>) -> Result<Vec<SessionInfo>> {
    let memories = engine
        .metadata_store()
        .list(&ScopeFilter::Subtree("session".into()), usize::MAX, 0)
        .await;

    let mut by_session: BTreeMap<String, SessionInfo> = BTreeMap::new();
    for memory in memories {
        let Some(session_id) = memory.scope.strip_prefix("session/") else {
            continue;
        };
        let session_id = session_id.split('/').next().unwrap_or(session_id);
        let entry = by_session
            .entry(session_id.to_string())
            .or_insert_with(|| SessionInfo {
                session_id: session_id.to_string(),
                scope: format!("session/{session_id}"),
                memory_count: 0,
                created_at: memory.created_at,
                last_activity: memory.created_at,
            });
        entry.memory_count += 1;
        entry.created_at = entry.created_at.min(memory.created_at);
        entry.last_activity = entry.last_activity.max(memory.created_at);
    }

    let mut sessions: Vec<SessionInfo> = by_session.into_values().collect();
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    Ok(sessions)
}

/// Delete session memories created before the age cutoff.
pub async fn cleanup_sessions(
    engine: &std::sync::Arc<MemoryEngine>,
    max_age_days: Option<i64>,
) -> Result<CleanupOutcome> {
    let days = max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS);
    if days < 0 {
        return Err(MemoryError::Validation(
            "max_age_days must not be negative".into(),
        ));
    }
    let cutoff = Utc::now() - Duration::days(days);

    let memories = engine
        .metadata_store()
        .list(&ScopeFilter::Subtree("session".into()), usize::MAX, 0)
        .await;

    let stale: Vec<(Uuid, String)> = memories
        .iter()
        .filter(|m| m.created_at < cutoff)
        .map(|m| (m.id, m.scope.clone()))
        .collect();

    let mut cleaned_memories = 0usize;
    for (id, _) in &stale {
        if engine.delete(*id).await.is_ok() {
            cleaned_memories += 1;
        }
    }

    // Sessions whose scope is now empty were fully cleaned.
    let remaining: std::collections::HashSet<String> = engine
        .metadata_store()
        .list_scopes()
        .await
        .into_iter()
        .filter(|s| s.starts_with("session/"))
        .collect();
    let mut cleaned_sessions: Vec<String> = stale
        .iter()
        .filter_map(|(_, scope)| scope.strip_prefix("session/"))
        .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
        .filter(|id| !remaining.iter().any(|s| scope::is_ancestor(&format!("session/{id}"), s)))
        .collect();
    cleaned_sessions.sort();
    cleaned_sessions.dedup();

    info!(
        cleaned = cleaned_memories,
        sessions = cleaned_sessions.len(),
        "Session cleanup completed"
    );
    Ok(CleanupOutcome {
        cleaned_memories,
        cleaned_sessions,
    })
}
