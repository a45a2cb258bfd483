//! `GET /health`: a cheap liveness check surfacing the active config
//! fingerprint and whether the embedding index has entries loaded.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    config_fingerprint: String,
    index_present: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.current_engine().await;
    Json(HealthResponse {
        status: "ok",
        config_fingerprint: engine.config_fingerprint.clone(),
        index_present: !engine.index.is_empty(),
    })
}
