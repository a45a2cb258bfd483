//! `POST /parse_enhanced`: the single-request entry point into
//! `Engine::standardize_exam`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use examstd_core::types::{Candidate, MatchResult, ParsedExam, SnomedRef, ValidationStatus};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseEnhancedRequest {
    pub exam_name: String,
    #[serde(default)]
    pub modality_code: String,
    #[serde(default)]
    pub data_source: String,
    /// Must match the currently active retriever/reranker if supplied;
    /// this server wires one `Engine` instance per process rather than
    /// hosting a registry of swappable retrievers per request.
    #[serde(default)]
    pub retriever: Option<String>,
    #[serde(default)]
    pub reranker: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseEnhancedResponse {
    pub input: ParsedExam,
    pub clean_name: String,
    pub snomed: SnomedRef,
    pub components: Option<Candidate>,
    pub all_candidates: Vec<Candidate>,
    pub confidence: f32,
    pub validation_status: ValidationStatus,
}

impl From<MatchResult> for ParseEnhancedResponse {
    fn from(result: MatchResult) -> Self {
        Self {
            input: result.input,
            clean_name: result.clean_name,
            snomed: result.snomed,
            components: result.winner,
            all_candidates: result.all_candidates,
            confidence: result.confidence,
            validation_status: result.validation_status,
        }
    }
}

pub async fn parse_enhanced(
    State(state): State<AppState>,
    Json(req): Json<ParseEnhancedRequest>,
) -> Result<Json<ParseEnhancedResponse>, StatusCode> {
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

    let result = engine
        .standardize_exam(&req.exam_name, &req.modality_code, &req.data_source)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "standardize_exam failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(result.into()))
}
