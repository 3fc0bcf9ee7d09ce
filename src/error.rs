//! Crate-wide error type and `Result` alias.
//!
//! Variants map one-to-one onto the failure kinds the engine distinguishes:
//! validation failures abort with no side effects, `NotFound` is returned
//! from reads and targeted mutations, `EmbeddingUnavailable` degrades rather
//! than fails where possible, and `Overloaded` signals retryable
//! backpressure. Partial writes (metadata succeeded, a secondary store did
//! not) are NOT errors; they surface as flags on success results and are
//! repaired by the reconcile pass.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// All error conditions the memory service can surface.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed scope, empty content, out-of-range parameter, bad id syntax.
    #[error("validation error: {0}")]
    Validation(String),

    /// Memory id absent from the metadata store.
    #[error("memory not found: {0}")]
    NotFound(uuid::Uuid),

    /// The embedding backend is unreachable or has not loaded.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// One of the three stores is temporarily unreachable.
    #[error("store unavailable: {store}: {reason}")]
    StoreUnavailable { store: &'static str, reason: String },

    /// Concurrency limit reached; the caller should retry.
    #[error("engine overloaded, retry later")]
    Overloaded,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Short stable kind tag used in shaped error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::Validation(_) => "validation",
            MemoryError::NotFound(_) => "not_found",
            MemoryError::EmbeddingUnavailable(_) => "embedding_unavailable",
            MemoryError::StoreUnavailable { .. } => "store_unavailable",
            MemoryError::Overloaded => "overloaded",
            MemoryError::Io(_) => "io",
            MemoryError::Serialization(_) => "serialization",
            MemoryError::Internal(_) => "internal",
        }
    }

    /// Whether the caller can expect a retry to succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::Overloaded | MemoryError::StoreUnavailable { .. }
        )
    }
}
