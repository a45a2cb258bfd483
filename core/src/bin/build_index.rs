//! Offline CLI driving `CacheBuilder`: loads the config and catalog from
//! the blob store, builds (or confirms) the versioned embedding index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use examstd_core::blob_store::{BlobStore, LocalFsBlobStore};
use examstd_core::cache_builder::CacheBuilder;
use examstd_core::catalog::ReferenceCatalog;
use examstd_core::config::{AppConfig, ConfigStore};
use examstd_core::embed::EmbeddingClient;
use examstd_core::parser::SemanticParser;

#[derive(Parser, Debug)]
#[command(name = "build_index", about = "Builds the versioned embedding index for the reference catalog")]
struct Args {
    /// Root directory backing the local-filesystem blob store.
    #[arg(long, default_value = "./blobstore")]
    blob_root: PathBuf,

    /// Blob key the reference catalog is stored under.
    #[arg(long, default_value = "catalog/reference_catalog.json")]
    catalog_key: String,

    /// Blob key the configuration tree is stored under.
    #[arg(long, default_value = "config/config.yaml")]
    config_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let blob_store = LocalFsBlobStore::new(&args.blob_root);

    let config_bytes = blob_store
        .get(&args.config_key)
        .await
        .context("loading configuration from blob store")?;
    let config: AppConfig = ConfigStore::load_from_str(
        std::str::from_utf8(&config_bytes).context("config blob is not valid utf8")?,
    )
    .context("parsing configuration")?;
    let config = Arc::new(config);

    let retriever_config = config
        .retrievers
        .get(&config.default_retriever)
        .context("default retriever missing from config")?;
    let embedding_client = Arc::new(EmbeddingClient::new(retriever_config));

    let parser = SemanticParser::new();
    let catalog = ReferenceCatalog::load(
        &blob_store,
        &args.catalog_key,
        &parser,
        &config.interventional_evidence,
    )
    .await
    .context("loading reference catalog")?;

    let builder = CacheBuilder::new(config.clone(), embedding_client);
    let fingerprint = builder
        .build(&catalog, &blob_store)
        .await
        .context("building embedding index")?;

    tracing::info!(fingerprint = %fingerprint, entries = catalog.len(), "index build complete");
    println!("index fingerprint: {}", fingerprint);
    Ok(())
}
