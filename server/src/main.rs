//! HTTP server for the radiology exam name standardization engine.
//!
//! Wires the `examstd-core` `Engine` behind `axum`, following the same
//! layering the teacher's web server uses: one shared `AppState`, a
//! `tower-http` trace/CORS layer, `tracing-subscriber` with an
//! `EnvFilter`.

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::{build_blob_store, build_engine, load_config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "examstd_server=info,examstd_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting exam standardization server");

    let blob_store = build_blob_store(&load_bootstrap_config()?);
    let config = Arc::new(load_config(blob_store.as_ref()).await?);
    let engine = build_engine(config, blob_store.clone()).await?;
    let state = AppState::new(engine, blob_store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .route("/models", get(routes::models::models))
        .route("/warmup", post(routes::warmup::warmup))
        .route("/parse_enhanced", post(routes::parse::parse_enhanced))
        .route("/parse_batch", post(routes::batch::parse_batch))
        .route("/batch_progress/:job_id", get(routes::batch::batch_progress))
        .route("/config/current", get(routes::config::get_current))
        .route("/config/update", post(routes::config::update))
        .route(
            "/admin/reload-validation-cache",
            post(routes::admin::reload_validation_cache),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let port: u16 = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "exam standardization server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolves the blob store root before the store itself can tell us
/// anything, from the `BLOB_STORE_ROOT` environment variable — the one
/// piece of bootstrap configuration that can't itself live in the blob
/// store it locates.
fn load_bootstrap_config() -> anyhow::Result<examstd_core::config::AppConfig> {
    let root_dir = std::env::var("BLOB_STORE_ROOT").unwrap_or_else(|_| "./blobstore".to_string());
    Ok(examstd_core::config::AppConfig {
        blob_store: examstd_core::config::BlobStoreConfig { root_dir },
        ..Default::default()
    })
}
