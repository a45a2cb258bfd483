//! Reranking stage: reorders retrieved candidates by relevance to the
//! query beyond raw dense similarity.
//!
//! Two implementations behind one `Reranker` trait, selected by a tagged
//! `RerankerKind` enum rather than a class hierarchy or boxed trait
//! object — the set of reranker kinds is closed and known at compile time.

mod cross_encoder;
mod llm;

pub use cross_encoder::MedicalCrossEncoder;
pub use llm::LLMReranker;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{Candidate, ParsedExam};

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Populates `rerank_score` on every candidate, returning them in
    /// score-sorted order if the implementation naturally produces one,
    /// or in input order otherwise — `LookupEngine` re-sorts downstream.
    async fn rerank(
        &self,
        query: &ParsedExam,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, RemoteError>;
}

pub enum RerankerKind {
    CrossEncoder(MedicalCrossEncoder),
    Llm(LLMReranker),
}

#[async_trait]
impl Reranker for RerankerKind {
    async fn rerank(
        &self,
        query: &ParsedExam,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, RemoteError> {
        match self {
            RerankerKind::CrossEncoder(r) => r.rerank(query, candidates).await,
            RerankerKind::Llm(r) => r.rerank(query, candidates).await,
        }
    }
}
