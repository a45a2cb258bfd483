//! Configuration tree loading and fingerprinting.
//!
//! `AppConfig` is the single source of truth loaded from YAML; every
//! sub-config carries sensible defaults so a partially-specified tree
//! degrades gracefully rather than failing startup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    pub name: String,
    pub endpoint: String,
    pub embedding_dim: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub max_elapsed_ms: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            name: "default-embedder".into(),
            endpoint: "http://localhost:8081/embed".into(),
            embedding_dim: 384,
            batch_size: 32,
            timeout_ms: 5_000,
            max_attempts: 4,
            max_elapsed_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKindConfig {
    CrossEncoder,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub kind: RerankerKindConfig,
    pub name: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_candidates: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            kind: RerankerKindConfig::CrossEncoder,
            name: "default-cross-encoder".into(),
            endpoint: "http://localhost:8081/score_pairs".into(),
            timeout_ms: 8_000,
            max_candidates: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub w_modality: f32,
    pub w_anatomy: f32,
    pub w_laterality: f32,
    pub w_contrast: f32,
    pub w_technique: f32,
    pub w_context: f32,
    pub w_rerank: f32,
    pub w_component: f32,
    pub confidence_floor: f32,
    pub top_n_candidates: usize,
    pub k_retrieve: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_modality: 0.30,
            w_anatomy: 0.30,
            w_laterality: 0.15,
            w_contrast: 0.15,
            w_technique: 0.05,
            w_context: 0.05,
            w_rerank: 0.6,
            w_component: 0.4,
            confidence_floor: 0.35,
            top_n_candidates: 5,
            k_retrieve: 25,
        }
    }
}

/// Explicit evidence sets for the interventional-vs-diagnostic predicate.
/// Kept as configuration per the spec's resolution of the open question:
/// the evidence set must be exposed, not hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionalEvidenceConfig {
    pub interventional_techniques: Vec<String>,
    pub diagnostic_modalities: Vec<String>,
    /// Clinical-context terms that, alongside an interventional technique,
    /// confirm an angiography token should resolve to vascular intent
    /// (e.g. `angio` + `trauma` → XA). Checked against `detect_clinical`'s
    /// output, not hard-coded in the parser.
    pub interventional_clinical_context: Vec<String>,
}

impl Default for InterventionalEvidenceConfig {
    fn default() -> Self {
        Self {
            interventional_techniques: vec![
                "angioplasty".into(),
                "embolization".into(),
                "stent placement".into(),
                "biopsy interventional".into(),
                "drainage".into(),
                "interventional".into(),
            ],
            diagnostic_modalities: vec![
                "CT".into(),
                "MR".into(),
                "US".into(),
                "XR".into(),
                "NM".into(),
                "Fluoroscopy".into(),
                "DEXA".into(),
                "Mammography".into(),
            ],
            interventional_clinical_context: vec!["trauma".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCacheConfig {
    pub max_size: usize,
}

impl Default for RequestCacheConfig {
    fn default() -> Self {
        Self { max_size: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    pub root_dir: String,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            root_dir: "./blobstore".into(),
        }
    }
}

/// The full configuration tree, loaded from YAML by `ConfigStore`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub retrievers: HashMap<String, RetrieverConfig>,
    #[serde(default)]
    pub rerankers: HashMap<String, RerankerConfig>,
    #[serde(default)]
    pub default_retriever: String,
    #[serde(default)]
    pub default_reranker: String,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub interventional_evidence: InterventionalEvidenceConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub request_cache: RequestCacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

impl AppConfig {
    /// Validate structurally-required keys, raising `ConfigError` if absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_retriever.is_empty() {
            return Err(ConfigError::MissingKey("default_retriever".into()));
        }
        if !self.retrievers.contains_key(&self.default_retriever) {
            return Err(ConfigError::MissingKey(format!(
                "retrievers.{}",
                self.default_retriever
            )));
        }
        if self.default_reranker.is_empty() {
            return Err(ConfigError::MissingKey("default_reranker".into()));
        }
        if !self.rerankers.contains_key(&self.default_reranker) {
            return Err(ConfigError::MissingKey(format!(
                "rerankers.{}",
                self.default_reranker
            )));
        }
        Ok(())
    }

    /// Embedding dimension of the configured default retriever.
    pub fn embedding_dim(&self) -> usize {
        self.retrievers
            .get(&self.default_retriever)
            .map(|r| r.embedding_dim)
            .unwrap_or(384)
    }

    /// Subset of this config that influences parsing and embeddings,
    /// serialized canonically for fingerprinting. Deliberately excludes
    /// request-cache size, logging level, and blob store location, which
    /// don't affect the index contents.
    fn fingerprint_relevant_json(&self) -> serde_json::Value {
        serde_json::json!({
            "default_retriever": self.default_retriever,
            "retriever": self.retrievers.get(&self.default_retriever),
            "interventional_evidence": self.interventional_evidence,
            "scoring": {
                "w_modality": self.scoring.w_modality,
                "w_anatomy": self.scoring.w_anatomy,
                "w_laterality": self.scoring.w_laterality,
                "w_contrast": self.scoring.w_contrast,
                "w_technique": self.scoring.w_technique,
                "w_context": self.scoring.w_context,
            },
        })
    }
}

/// Computes the content-addressed fingerprint identifying one
/// (parsing rules, catalog content, retriever model, embedding dim)
/// combination. Rendered as a lowercase hex string.
pub fn compute_fingerprint(config: &AppConfig, catalog_content_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.fingerprint_relevant_json().to_string().as_bytes());
    hasher.update(catalog_content_hash.as_bytes());
    hasher.update(config.embedding_dim().to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Loads and validates the configuration tree from a YAML string.
pub struct ConfigStore;

impl ConfigStore {
    pub fn load_from_str(yaml: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::load_from_str(&contents)
    }
}
