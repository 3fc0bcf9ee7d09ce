//! The storage trio: vector index, metadata store, association graph.
//!
//! Each store persists to its own JSON sidecar under the data directory and
//! is safe for concurrent use (readers share, writers exclude). The
//! metadata store is the authoritative source for field-level data; when
//! the stores disagree, the reconcile pass repairs the other two toward it.

pub mod graph;
pub mod metadata;
pub mod vector;

pub use graph::AssociationGraph;
pub use metadata::MetadataStore;
pub use vector::VectorIndex;
