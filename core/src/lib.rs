//! Standardizes heterogeneous radiology exam names against an
//! authoritative SNOMED-backed reference catalog.
//!
//! Control flow for a single request: raw text → [`parser::SemanticParser`]
//! → [`validation_cache::ValidationCache`] (short-circuit on approved,
//! filter rejected) → [`index::VectorIndex`] top-K → [`rerank::Reranker`]
//! → component-alignment scoring → clinical-safety vetoes → fused score →
//! winner. [`batch::BatchOrchestrator`] wraps this with chunking and
//! bounded concurrency for large jobs.

pub mod batch;
pub mod blob_store;
pub mod cache_builder;
pub mod catalog;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod index;
pub mod parser;
pub mod rerank;
pub mod request_cache;
pub mod types;
pub mod validation_cache;

pub use engine::Engine;
pub use error::{BlobStoreError, CatalogError, ConfigError, EngineError, IndexError, RemoteError};
pub use types::MatchResult;
