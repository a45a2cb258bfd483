//! Error taxonomy for the standardization pipeline.
//!
//! Parsing and scoring are pure and never raise; only the config/catalog
//! loaders, the index loader, and remote clients produce these.

use thiserror::Error;

/// Errors raised while loading or validating the configuration tree.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config source: {0}")]
    Read(String),
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Errors raised while loading the reference catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog source: {0}")]
    Read(String),
    #[error("failed to parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog is empty")]
    Empty,
}

/// Errors raised by the `VectorIndex` persistence layer.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("persisted index fingerprint {found} does not match current fingerprint {expected}")]
    Mismatch { expected: String, found: String },
    #[error("malformed index blob: {0}")]
    Malformed(String),
    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),
    #[error("index dimension {found} does not match expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Errors raised by the blob store abstraction.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("io error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the `EmbeddingClient`.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transient remote failure after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },
    #[error("remote call failed permanently: {0}")]
    Failure(String),
    #[error("remote call exceeded deadline of {0:?}")]
    Timeout(std::time::Duration),
}

/// Top-level errors the `LookupEngine` may raise out of `standardize_exam`.
///
/// Everything else (no match, reranker fallback, validation faults) is
/// folded into the returned `MatchResult` rather than propagated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("remote dependency failed: {0}")]
    RemoteFailure(#[from] RemoteError),
    #[error("vector index is unavailable or stale: {0}")]
    IndexMismatch(#[from] IndexError),
}
