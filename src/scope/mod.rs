//! Hierarchical scope paths.
//!
//! A scope is a `/`-separated path of 1–10 segments, each matching
//! `[A-Za-z0-9_-]+`. Scopes classify memories and act as filters on every
//! search. All functions here are pure; the engine and stores call them on
//! every boundary that accepts a caller-supplied path.

pub mod suggest;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Maximum number of path segments in a scope.
pub const MAX_DEPTH: usize = 10;

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Validate a scope path against the segment pattern and depth limit.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(MemoryError::Validation("scope must not be empty".into()));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() > MAX_DEPTH {
        return Err(MemoryError::Validation(format!(
            "scope '{path}' exceeds maximum depth of {MAX_DEPTH}"
        )));
    }
    for segment in segments {
        if segment == "." || segment == ".." {
            return Err(MemoryError::Validation(format!(
                "scope '{path}' contains reserved segment '{segment}'"
            )));
        }
        if !SEGMENT_RE.is_match(segment) {
            return Err(MemoryError::Validation(format!(
                "scope '{path}' contains invalid segment '{segment}'"
            )));
        }
    }
    Ok(())
}

/// The parent scope, or `None` for a single-segment path.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Whether `a` is `b` itself or an ancestor of `b`.
pub fn is_ancestor(a: &str, b: &str) -> bool {
    a == b || (b.len() > a.len() && b.starts_with(a) && b.as_bytes()[a.len()] == b'/')
}

/// All ancestors of `path`, from immediate parent up to the root segment.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = path;
    while let Some(p) = parent(current) {
        out.push(p);
        current = p;
    }
    out
}

/// Number of segments in a scope path.
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// One-level children of `parent_scope` present in `universe`.
///
/// A scope `x/y/z` contributes the child `x/y` when listing children of `x`,
/// so intermediate scopes appear even if no memory lives in them directly.
pub fn children_of<'a, I>(parent_scope: &str, universe: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let prefix = format!("{parent_scope}/");
    let mut children: Vec<String> = universe
        .into_iter()
        .filter_map(|scope| {
            let rest = scope.strip_prefix(&prefix)?;
            let first = rest.split('/').next()?;
            Some(format!("{parent_scope}/{first}"))
        })
        .collect();
    children.sort();
    children.dedup();
    children
}

/// Scope predicate used by the vector index and metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScopeFilter {
    /// No restriction: match every scope.
    #[default]
    All,
    /// Match only records whose scope equals the path exactly.
    Exact(String),
    /// Match the path itself and every descendant.
    Subtree(String),
}

impl ScopeFilter {
    /// Build a filter from an optional scope and the child-inclusion flag.
    pub fn from_request(scope: Option<&str>, include_child_scopes: bool) -> Self {
        match scope {
            None => ScopeFilter::All,
            Some(s) if include_child_scopes => ScopeFilter::Subtree(s.to_string()),
            Some(s) => ScopeFilter::Exact(s.to_string()),
        }
    }

    pub fn matches(&self, scope: &str) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::Exact(s) => scope == s,
            ScopeFilter::Subtree(s) => is_ancestor(s, scope),
        }
    }
}
