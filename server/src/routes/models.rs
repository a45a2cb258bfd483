//! `GET /models`: the configured retriever/reranker catalog, so callers
//! can discover what `retriever`/`reranker` values `/parse_enhanced` and
//! `/parse_batch` will currently accept.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RetrieverInfo {
    id: String,
    name: String,
    status: &'static str,
    description: String,
}

#[derive(Debug, Serialize)]
pub struct RerankerInfo {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: examstd_core::config::RerankerKindConfig,
    status: &'static str,
    description: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    retrievers: Vec<RetrieverInfo>,
    rerankers: Vec<RerankerInfo>,
    default_retriever: String,
    default_reranker: String,
}

pub async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let engine = state.current_engine().await;
    let config = &engine.config;

    let mut retrievers: Vec<RetrieverInfo> = config
        .retrievers
        .iter()
        .map(|(id, cfg)| RetrieverInfo {
            id: id.clone(),
            name: cfg.name.clone(),
            status: if *id == config.default_retriever {
                "active"
            } else {
                "available"
            },
            description: format!("{} (dim={})", cfg.endpoint, cfg.embedding_dim),
        })
        .collect();
    retrievers.sort_by(|a, b| a.id.cmp(&b.id));

    let mut rerankers: Vec<RerankerInfo> = config
        .rerankers
        .iter()
        .map(|(id, cfg)| RerankerInfo {
            id: id.clone(),
            name: cfg.name.clone(),
            kind: cfg.kind,
            status: if *id == config.default_reranker {
                "active"
            } else {
                "available"
            },
            description: cfg.endpoint.clone(),
        })
        .collect();
    rerankers.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ModelsResponse {
        retrievers,
        rerankers,
        default_retriever: config.default_retriever.clone(),
        default_reranker: config.default_reranker.clone(),
    })
}
