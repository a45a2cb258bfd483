//! Offline procedure that (re)builds the versioned embedding index and
//! uploads it to the blob store. Idempotent: if a blob already exists at
//! the computed fingerprint, it exits without re-embedding.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::blob_store::{join_key, BlobStore};
use crate::catalog::ReferenceCatalog;
use crate::config::{compute_fingerprint, AppConfig};
use crate::embed::Embedder;
use crate::error::{CatalogError, IndexError};
use crate::index::VectorIndex;

pub struct CacheBuilder {
    config: Arc<AppConfig>,
    embedding_client: Arc<dyn Embedder>,
}

impl CacheBuilder {
    pub fn new(config: Arc<AppConfig>, embedding_client: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            embedding_client,
        }
    }

    /// Builds (or reuses) the index for `catalog` under the configured
    /// default retriever, returning the fingerprint it is stored under.
    #[instrument(skip(self, catalog, blob_store))]
    pub async fn build(
        &self,
        catalog: &ReferenceCatalog,
        blob_store: &dyn BlobStore,
    ) -> Result<String, IndexError> {
        let fingerprint = compute_fingerprint(&self.config, catalog.content_hash());
        let key = join_key(&["indices", &self.config.default_retriever, &format!("{}.bin", fingerprint)]);

        if blob_store.exists(&key).await {
            info!(fingerprint = %fingerprint, "index already present, skipping rebuild");
            return Ok(fingerprint);
        }

        info!(fingerprint = %fingerprint, entries = catalog.len(), "rebuilding embedding index");

        let texts: Vec<String> = catalog.entries().iter().map(|e| e.embedding_text()).collect();
        let ids: Vec<String> = catalog.entries().iter().map(|e| e.id.clone()).collect();
        let vectors = self.embedding_client.embed(&texts).await.map_err(|e| {
            IndexError::Malformed(format!("embedding the catalog failed: {}", e))
        })?;

        let index = VectorIndex::build(fingerprint.clone(), ids, vectors)?;
        index.save(blob_store, &key).await?;

        Ok(fingerprint)
    }
}

/// Raised when the catalog itself could not be prepared before building;
/// kept distinct from `IndexError` so callers can distinguish "nothing to
/// embed" from "embedding failed".
pub fn require_nonempty_catalog(catalog: &ReferenceCatalog) -> Result<(), CatalogError> {
    if catalog.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::LocalFsBlobStore;
    use crate::catalog::CatalogEntryRaw;
    use crate::config::RetrieverConfig;
    use crate::embed::EmbeddingClient;
    use crate::parser::SemanticParser;
    use std::collections::HashMap;

    fn sample_config() -> AppConfig {
        let mut retrievers = HashMap::new();
        retrievers.insert("bge-small".to_string(), RetrieverConfig::default());
        AppConfig {
            retrievers,
            default_retriever: "bge-small".into(),
            ..Default::default()
        }
    }

    #[test]
    fn require_nonempty_catalog_rejects_empty() {
        let parser = SemanticParser::new();
        let evidence = crate::config::InterventionalEvidenceConfig::default();
        let raw = vec![CatalogEntryRaw {
            id: "1".into(),
            snomed_concept_id: "x".into(),
            snomed_fsn: "fsn".into(),
            clean_name: "clean".into(),
            modality_hint: "CT".into(),
        }];
        let catalog = ReferenceCatalog::from_raw_entries(raw, &parser, &evidence).unwrap();
        assert!(require_nonempty_catalog(&catalog).is_ok());
    }

    #[tokio::test]
    async fn build_is_idempotent_when_blob_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());
        let config = Arc::new(sample_config());
        let client = Arc::new(EmbeddingClient::new(&config.retrievers["bge-small"]));
        let builder = CacheBuilder::new(config.clone(), client);

        let parser = SemanticParser::new();
        let evidence = crate::config::InterventionalEvidenceConfig::default();
        let raw = vec![CatalogEntryRaw {
            id: "1".into(),
            snomed_concept_id: "x".into(),
            snomed_fsn: "fsn".into(),
            clean_name: "clean".into(),
            modality_hint: "CT".into(),
        }];
        let catalog = ReferenceCatalog::from_raw_entries(raw, &parser, &evidence).unwrap();

        let fingerprint = compute_fingerprint(&config, catalog.content_hash());
        let key = join_key(&["indices", &config.default_retriever, &format!("{}.bin", fingerprint)]);
        store.put(&key, b"placeholder").await.unwrap();

        let result = builder.build(&catalog, &store).await.unwrap();
        assert_eq!(result, fingerprint);
        // The placeholder bytes prove no re-embedding/overwrite happened.
        assert_eq!(store.get(&key).await.unwrap(), b"placeholder");
    }
}
