//! Thin remote client for the embedding and cross-encoder endpoints.
//!
//! Deliberately stateless: no caching lives here, matching §4.3's
//! contract that `RequestCache` and `ValidationCache` are the engine's
//! concern, not the client's.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::RetrieverConfig;
use crate::error::RemoteError;

/// The two remote operations the engine needs from an embedding backend.
/// Abstracted as a trait (rather than used as a concrete `EmbeddingClient`
/// throughout) so the engine and rerankers can be exercised in tests
/// against a stub, without a live remote endpoint.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError>;
    async fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RemoteError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ScorePairsRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ScorePairsResponse {
    scores: Vec<f32>,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    embed_endpoint: String,
    score_endpoint: String,
    batch_size: usize,
    timeout: Duration,
    max_attempts: u32,
    max_elapsed: Duration,
}

impl EmbeddingClient {
    pub fn new(config: &RetrieverConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            embed_endpoint: config.endpoint.clone(),
            score_endpoint: config.endpoint.replace("/embed", "/score_pairs"),
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts.max(1),
            max_elapsed: Duration::from_millis(config.max_elapsed_ms),
        }
    }

    async fn call_with_retry<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, RemoteError> {
        let deadline = tokio::time::Instant::now() + self.max_elapsed;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self.try_once::<B, R>(endpoint, body).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts || tokio::time::Instant::now() >= deadline => {
                    warn!(attempt, %err, "remote call exhausted retries");
                    return Err(RemoteError::Transient {
                        attempts: attempt,
                        message: err,
                    });
                }
                Err(err) => {
                    let backoff = Duration::from_millis(100u64 * 2u64.pow(attempt.min(6)));
                    warn!(attempt, %err, backoff_ms = backoff.as_millis() as u64, "retrying remote call");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn try_once<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, String> {
        let response = self
            .http
            .post(endpoint)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(format!("transient status {}", response.status()));
        }
        if !response.status().is_success() {
            return Err(format!("remote call failed permanently with status {}", response.status()));
        }

        response.json::<R>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// Embeds `texts` in configured-size batches, L2-normalizing every
    /// vector before returning it.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let body = EmbedRequest { texts: chunk };
            let response: EmbedResponse = self.call_with_retry(&self.embed_endpoint, &body).await?;
            out.extend(response.vectors.into_iter().map(|v| l2_normalize(&v)));
        }
        Ok(out)
    }

    /// Cross-encoder scoring of `query` against `documents`, batched.
    /// Logits are transformed to `[0, 1]` via the logistic function.
    #[instrument(skip(self, query, documents), fields(count = documents.len()))]
    async fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RemoteError> {
        let mut out = Vec::with_capacity(documents.len());
        for chunk in documents.chunks(self.batch_size) {
            let body = ScorePairsRequest {
                query,
                documents: chunk,
            };
            let response: ScorePairsResponse = self.call_with_retry(&self.score_endpoint, &body).await?;
            out.extend(response.scores.into_iter().map(sigmoid));
        }
        Ok(out)
    }
}

fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_zero_vector_is_unchanged() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn sigmoid_of_zero_is_half() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sigmoid_saturates_toward_bounds() {
        assert!(sigmoid(50.0) > 0.999);
        assert!(sigmoid(-50.0) < 0.001);
    }
}
