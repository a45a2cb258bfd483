//! `POST /admin/reload-validation-cache`: re-reads the approved/rejected
//! mapping blobs and invalidates the request cache, since a newly
//! approved mapping may now short-circuit results that were previously
//! cached unapproved.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::{self, AppState};

#[derive(Debug, Serialize)]
pub struct ReloadValidationCacheResponse {
    approved_count: usize,
    rejected_count: usize,
}

pub async fn reload_validation_cache(State(state): State<AppState>) -> Json<ReloadValidationCacheResponse> {
    let engine = state.current_engine().await;
    let (approved_count, rejected_count) = engine
        .validation_cache
        .reload(state.blob_store.as_ref(), state::APPROVED_KEY, state::REJECTED_KEY)
        .await;
    engine.request_cache.clear();

    Json(ReloadValidationCacheResponse {
        approved_count,
        rejected_count,
    })
}
