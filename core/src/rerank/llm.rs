//! LLM-as-reranker: a single structured prompt, parsed back into
//! per-candidate scores.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::RerankerConfig;
use crate::error::RemoteError;
use crate::types::{Candidate, ParsedExam};

use super::Reranker;

#[derive(Debug, Serialize)]
struct LlmRequest<'a> {
    prompt: &'a str,
    strict_json: bool,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    completion: String,
}

#[derive(Debug, Deserialize)]
struct ScoredIndex {
    index: usize,
    score: f32,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

pub struct LLMReranker {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    max_candidates: usize,
}

impl LLMReranker {
    pub fn new(config: &RerankerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_candidates: config.max_candidates,
        }
    }

    fn build_prompt(&self, query: &ParsedExam, candidates: &[Candidate]) -> String {
        let mut prompt = format!(
            "Query: {}\nCandidates:\n",
            query.preprocessed
        );
        for (idx, candidate) in candidates.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} | {} [modality={}, laterality={:?}, contrast={:?}, anatomy={}]\n",
                idx,
                candidate.entry.clean_name,
                candidate.entry.snomed_fsn,
                candidate.entry.parsed.modality,
                candidate.entry.parsed.laterality,
                candidate.entry.parsed.contrast,
                candidate.entry.parsed.anatomy.join(","),
            ));
        }
        prompt.push_str(
            "Return a JSON array of {index, score in [0,1], reason} covering every candidate above.",
        );
        prompt
    }

    async fn call(&self, prompt: &str, strict: bool) -> Result<String, RemoteError> {
        let body = LlmRequest {
            prompt,
            strict_json: strict,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RemoteError::Failure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Failure(format!(
                "llm endpoint returned status {}",
                response.status()
            )));
        }

        let parsed: LlmResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Failure(e.to_string()))?;
        Ok(parsed.completion)
    }
}

#[async_trait]
impl Reranker for LLMReranker {
    #[instrument(skip(self, query, candidates), fields(count = candidates.len()))]
    async fn rerank(
        &self,
        query: &ParsedExam,
        mut candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, RemoteError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        candidates.truncate(self.max_candidates);

        let prompt = self.build_prompt(query, &candidates);

        let first_attempt = self.call(&prompt, false).await?;
        if let Ok(scored) = parse_scored_indices(&first_attempt, candidates.len()) {
            apply_scores(&mut candidates, scored);
            return Ok(candidates);
        }

        warn!("llm reranker returned malformed output, retrying with strict-json instruction");
        let second_attempt = self.call(&prompt, true).await?;
        match parse_scored_indices(&second_attempt, candidates.len()) {
            Ok(scored) => {
                apply_scores(&mut candidates, scored);
                Ok(candidates)
            }
            Err(_) => {
                warn!("llm reranker failed twice, falling back to dense_score");
                for candidate in &mut candidates {
                    candidate.rerank_score = Some(candidate.dense_score);
                }
                Ok(candidates)
            }
        }
    }
}

fn parse_scored_indices(raw: &str, expected_len: usize) -> Result<Vec<ScoredIndex>, ()> {
    let parsed: Vec<ScoredIndex> = serde_json::from_str(raw.trim()).map_err(|_| ())?;
    if parsed.len() != expected_len {
        return Err(());
    }
    if parsed.iter().any(|s| s.index >= expected_len) {
        return Err(());
    }
    Ok(parsed)
}

fn apply_scores(candidates: &mut [Candidate], scored: Vec<ScoredIndex>) {
    for entry in scored {
        if let Some(candidate) = candidates.get_mut(entry.index) {
            candidate.rerank_score = Some(entry.score.clamp(0.0, 1.0));
        }
    }
}
