//! Cross-encoder reranker: batched remote `score_pairs` scoring.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::embed::Embedder;
use crate::error::RemoteError;
use crate::types::{Candidate, ParsedExam};

use super::Reranker;

pub struct MedicalCrossEncoder {
    client: Arc<dyn Embedder>,
}

impl MedicalCrossEncoder {
    pub fn new(client: Arc<dyn Embedder>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reranker for MedicalCrossEncoder {
    #[instrument(skip(self, query, candidates), fields(count = candidates.len()))]
    async fn rerank(
        &self,
        query: &ParsedExam,
        mut candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, RemoteError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let documents: Vec<String> = candidates.iter().map(|c| c.entry.embedding_text()).collect();
        let scores = self
            .client
            .score_pairs(&query.preprocessed, &documents)
            .await?;
        for (candidate, score) in candidates.iter_mut().zip(scores.into_iter()) {
            candidate.rerank_score = Some(score);
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbeddingClient;

    #[tokio::test]
    async fn empty_candidates_short_circuits_without_remote_call() {
        let config = crate::config::RetrieverConfig::default();
        let client = Arc::new(EmbeddingClient::new(&config));
        let reranker = MedicalCrossEncoder::new(client);
        let query = ParsedExam::default();
        let result = reranker.rerank(&query, vec![]).await.unwrap();
        assert!(result.is_empty());
    }
}
