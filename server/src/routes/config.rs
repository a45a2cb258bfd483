//! `GET /config/current` and `POST /config/update`: read back the live
//! configuration YAML, or replace it and rebuild the engine in the
//! background.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use examstd_core::blob_store::BlobStore;
use examstd_core::config::ConfigStore;
use serde::{Deserialize, Serialize};

use crate::state::{self, AppState};

#[derive(Debug, Serialize)]
pub struct ConfigCurrentResponse {
    config_yaml: String,
    timestamp: String,
}

pub async fn get_current(State(state): State<AppState>) -> Result<Json<ConfigCurrentResponse>, StatusCode> {
    let bytes = state
        .blob_store
        .get(state::CONFIG_KEY)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to read current config blob");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let config_yaml = String::from_utf8(bytes).map_err(|e| {
        tracing::error!(error = %e, "config blob is not valid utf8");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ConfigCurrentResponse {
        config_yaml,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConfigUpdateRequest {
    pub config_yaml: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigUpdateResponse {
    status: &'static str,
    timestamp: String,
}

pub async fn update(
    State(state): State<AppState>,
    Json(req): Json<ConfigUpdateRequest>,
) -> Result<Json<ConfigUpdateResponse>, StatusCode> {
    let new_config = ConfigStore::load_from_str(&req.config_yaml).map_err(|e| {
        tracing::warn!(error = %e, "rejected malformed config update");
        StatusCode::BAD_REQUEST
    })?;

    state
        .blob_store
        .put(state::CONFIG_KEY, req.config_yaml.as_bytes())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to persist updated config");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let blob_store = state.blob_store.clone();
    let app_state = state.clone();
    tokio::spawn(async move {
        match state::build_engine(Arc::new(new_config), blob_store).await {
            Ok(engine) => {
                app_state.set_engine(engine).await;
                tracing::info!("engine rebuilt and swapped in after config update");
            }
            Err(e) => tracing::error!(error = %e, "background engine rebuild failed"),
        }
    });

    Ok(Json(ConfigUpdateResponse {
        status: "accepted",
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
