//! `POST /parse_batch` and `GET /batch_progress/{job_id}`: chunked batch
//! standardization, run inline for small jobs and backgrounded (with a
//! persisted result blob) for larger ones.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use examstd_core::batch::{BatchExamInput, BatchOrchestrator, BatchStatus, PersistedBatchResult};
use examstd_core::blob_store::{join_key, BlobStore};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseBatchRequest {
    pub exams: Vec<BatchExamInput>,
    #[serde(default)]
    pub retriever: Option<String>,
    #[serde(default)]
    pub reranker: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ParseBatchResponse {
    Inline {
        results: Vec<examstd_core::batch::BatchResultEntry>,
    },
    Backgrounded {
        job_id: String,
        results_url: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchProgressResponse {
    completed: usize,
    total: usize,
    status: BatchStatus,
}

pub async fn parse_batch(
    State(state): State<AppState>,
    Json(req): Json<ParseBatchRequest>,
) -> Result<Json<ParseBatchResponse>, StatusCode> {
    let engine = state.current_engine().await;

    if let Some(retriever) = &req.retriever {
        if *retriever != engine.retriever_id {
            return Err(StatusCode::BAD_REQUEST);
        }
    }
    if let Some(reranker) = &req.reranker {
        if *reranker != engine.reranker_id {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let chunk_size = engine.config.batch.chunk_size;
    let max_concurrency = engine.config.batch.max_concurrency;
    let orchestrator = BatchOrchestrator::new(engine.clone(), chunk_size, max_concurrency);

    if req.exams.len() <= chunk_size {
        let job_id = uuid::Uuid::new_v4().to_string();
        let (_handle, join) = orchestrator.process_batch(job_id, req.exams);
        let results = join.await.map_err(|e| {
            tracing::error!(error = %e, "inline batch task panicked");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        return Ok(Json(ParseBatchResponse::Inline { results }));
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    let (handle, join) = orchestrator.process_batch(job_id.clone(), req.exams);
    state.register_batch(job_id.clone(), handle).await;

    let blob_store = state.blob_store.clone();
    let retriever_id = engine.retriever_id.clone();
    let reranker_id = engine.reranker_id.clone();
    let persisted_job_id = job_id.clone();
    tokio::spawn(async move {
        match join.await {
            Ok(results) => {
                let persisted = PersistedBatchResult::new(persisted_job_id.clone(), retriever_id, reranker_id, results);
                let key = join_key(&["batches", &format!("{}.json", persisted_job_id)]);
                match serde_json::to_vec(&persisted) {
                    Ok(bytes) => {
                        if let Err(e) = blob_store.put(&key, &bytes).await {
                            tracing::error!(error = %e, job_id = %persisted_job_id, "failed to persist batch result");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize batch result"),
                }
            }
            Err(e) => tracing::error!(error = %e, "batch orchestration task panicked"),
        }
    });

    Ok(Json(ParseBatchResponse::Backgrounded {
        results_url: join_key(&["batches", &format!("{}.json", job_id)]),
        job_id,
    }))
}

pub async fn batch_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<BatchProgressResponse>, StatusCode> {
    let handle = state
        .lookup_batch(&job_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(BatchProgressResponse {
        completed: handle.completed(),
        total: handle.total(),
        status: handle.status(),
    }))
}
