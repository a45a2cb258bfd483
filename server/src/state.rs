//! Shared application state and the engine-construction helper used both
//! at startup and whenever `/config/update` or `/admin/reload-validation-cache`
//! need to rebuild the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use examstd_core::blob_store::{join_key, BlobStore, LocalFsBlobStore};
use examstd_core::cache_builder::CacheBuilder;
use examstd_core::catalog::ReferenceCatalog;
use examstd_core::config::{AppConfig, ConfigStore, RerankerKindConfig};
use examstd_core::embed::{Embedder, EmbeddingClient};
use examstd_core::engine::Engine;
use examstd_core::index::VectorIndex;
use examstd_core::parser::SemanticParser;
use examstd_core::rerank::{LLMReranker, MedicalCrossEncoder, Reranker, RerankerKind};
use examstd_core::request_cache::RequestCache;
use examstd_core::validation_cache::ValidationCache;
use tokio::sync::{Mutex, RwLock};

pub const CATALOG_KEY: &str = "catalog/reference_catalog.json";
pub const CONFIG_KEY: &str = "config/config.yaml";
pub const APPROVED_KEY: &str = "validation/approved_mappings_cache.json";
pub const REJECTED_KEY: &str = "validation/rejected_mappings.json";

/// Shared application state. Every field is cheap to clone so `AppState`
/// itself can be handed to axum's `with_state` directly.
#[derive(Clone)]
pub struct AppState {
    /// Swappable under a write lock by `/config/update` and
    /// `/admin/reload-validation-cache`; readers clone the `Arc` and never
    /// hold the lock across a request.
    pub engine: Arc<RwLock<Arc<Engine>>>,
    pub blob_store: Arc<dyn BlobStore>,
    /// In-memory registry of in-flight/completed batch handles, keyed by
    /// job id, polled by `/batch_progress/{job_id}`.
    pub batches: Arc<Mutex<HashMap<String, Arc<examstd_core::batch::BatchHandle>>>>,
}

impl AppState {
    pub fn new(engine: Engine, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            engine: Arc::new(RwLock::new(Arc::new(engine))),
            blob_store,
            batches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn current_engine(&self) -> Arc<Engine> {
        self.engine.read().await.clone()
    }

    pub async fn set_engine(&self, engine: Engine) {
        let mut guard = self.engine.write().await;
        *guard = Arc::new(engine);
    }

    pub async fn register_batch(&self, job_id: String, handle: Arc<examstd_core::batch::BatchHandle>) {
        self.batches.lock().await.insert(job_id, handle);
    }

    pub async fn lookup_batch(&self, job_id: &str) -> Option<Arc<examstd_core::batch::BatchHandle>> {
        self.batches.lock().await.get(job_id).cloned()
    }
}

/// Constructs the local-filesystem blob store rooted at `AppConfig.blob_store.root_dir`.
pub fn build_blob_store(config: &AppConfig) -> Arc<dyn BlobStore> {
    Arc::new(LocalFsBlobStore::new(config.blob_store.root_dir.clone()))
}

/// Loads `AppConfig` from the blob store's `config/config.yaml` key.
pub async fn load_config(blob_store: &dyn BlobStore) -> anyhow::Result<AppConfig> {
    let bytes = blob_store
        .get(CONFIG_KEY)
        .await
        .context("loading configuration from blob store")?;
    let yaml = std::str::from_utf8(&bytes).context("config blob is not valid utf8")?;
    ConfigStore::load_from_str(yaml).context("parsing configuration")
}

/// Builds a fully wired `Engine`: loads the catalog, ensures the embedding
/// index exists (building it if necessary), loads the validation cache,
/// and assembles the configured retriever/reranker pair. Shared between
/// server startup and the `/config/update` reload path.
pub async fn build_engine(config: Arc<AppConfig>, blob_store: Arc<dyn BlobStore>) -> anyhow::Result<Engine> {
    let parser = Arc::new(SemanticParser::new());

    let catalog = ReferenceCatalog::load(
        blob_store.as_ref(),
        CATALOG_KEY,
        &parser,
        &config.interventional_evidence,
    )
    .await
    .context("loading reference catalog")?;

    let retriever_config = config
        .retrievers
        .get(&config.default_retriever)
        .context("default retriever missing from config")?;
    let embedding_client: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(retriever_config));

    let reranker_config = config
        .rerankers
        .get(&config.default_reranker)
        .context("default reranker missing from config")?;
    let reranker: Arc<dyn Reranker> = match reranker_config.kind {
        RerankerKindConfig::CrossEncoder => Arc::new(RerankerKind::CrossEncoder(MedicalCrossEncoder::new(
            embedding_client.clone(),
        ))),
        RerankerKindConfig::Llm => Arc::new(RerankerKind::Llm(LLMReranker::new(reranker_config))),
    };

    let builder = CacheBuilder::new(config.clone(), embedding_client.clone());
    let fingerprint = builder
        .build(&catalog, blob_store.as_ref())
        .await
        .context("building embedding index")?;

    let index_key = join_key(&[
        "indices",
        &config.default_retriever,
        &format!("{}.bin", fingerprint),
    ]);
    let index = Arc::new(
        VectorIndex::load(blob_store.as_ref(), &index_key, &fingerprint)
            .await
            .context("loading embedding index")?,
    );

    let validation_cache = Arc::new(ValidationCache::empty());
    validation_cache
        .reload(blob_store.as_ref(), APPROVED_KEY, REJECTED_KEY)
        .await;

    let request_cache = Arc::new(RequestCache::new(config.request_cache.max_size));

    Ok(Engine {
        catalog: Arc::new(catalog),
        index,
        parser,
        embedding_client,
        reranker,
        validation_cache,
        request_cache,
        retriever_id: config.default_retriever.clone(),
        reranker_id: config.default_reranker.clone(),
        config_fingerprint: fingerprint,
        config,
    })
}
