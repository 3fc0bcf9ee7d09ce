//! Mnemon, an associative memory service for LLM agents.
//!
//! Stores free-form textual memories and returns them by semantic
//! similarity, structural association, or hierarchical scope. The crate
//! exposes an in-process [`ops::MemoryService`] facade; tool-protocol
//! framing, embedding model hosting, and transport live outside.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use mnemon::config::Config;
//! use mnemon::embedding::create_embedder;
//! use mnemon::engine::MemoryEngine;
//! use mnemon::ops::{MemoryService, StoreRequest};
//! use mnemon::response::ResponseLevel;
//!
//! let mut config = Config::default();
//! config.storage.data_dir = std::env::temp_dir().join("mnemon-doc-example");
//! let embedder = create_embedder(&config.embedding);
//! let engine = Arc::new(MemoryEngine::new(config, embedder).unwrap());
//! let service = MemoryService::new(engine);
//!
//! let response = service.store(StoreRequest {
//!     content: "Rust ownership notes".into(),
//!     scope: "learning/programming".into(),
//!     tags: vec![],
//!     category: None,
//!     metadata: Default::default(),
//!     allow_duplicates: true,
//!     duplicate_threshold: 0.95,
//!     response_level: ResponseLevel::Minimal,
//! }).await.unwrap();
//! assert_eq!(response["success"], serde_json::json!(true));
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod ops;
pub mod response;
pub mod scope;
pub mod search;
pub mod session;
pub mod storage;

pub use error::{MemoryError, Result};
