//! The in-process operation surface consumed by the tool-framing layer.
//!
//! `requests` holds one validated record per operation; `service` runs them
//! against the engine and shapes every result through the response layer.

mod requests;
mod service;

pub use requests::*;
pub use service::MemoryService;
