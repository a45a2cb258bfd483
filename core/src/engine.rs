//! The core orchestration: retrieve, rerank, score, veto, select winner.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{instrument, warn};

use crate::catalog::ReferenceCatalog;
use crate::config::{AppConfig, ScoringConfig};
use crate::embed::Embedder;
use crate::error::{EngineError, RemoteError};
use crate::index::VectorIndex;
use crate::parser::SemanticParser;
use crate::rerank::Reranker;
use crate::request_cache::{RequestCache, RequestCacheKey};
use crate::types::{Candidate, Contrast, Laterality, MatchResult, ParsedExam, ValidationStatus};
use crate::validation_cache::ValidationCache;

/// Anatomy terms that exist as a left/right pair on a typical patient;
/// used to decide whether `bilateral` conflicts with a single-sided
/// candidate.
const PAIRED_ANATOMY: &[&str] = &[
    "knee", "wrist", "hand", "elbow", "shoulder", "hip", "ankle", "foot", "kidney", "kidneys",
    "breast", "ovary", "extremity",
];

/// Modalities considered interchangeable for the purpose of the
/// clinical-safety veto (plain film vs. mammographic film).
const MODALITY_EQUIVALENCE_CLASS: &[&str] = &["XR", "Mammography"];

pub struct Engine {
    pub catalog: Arc<ReferenceCatalog>,
    pub index: Arc<VectorIndex>,
    pub parser: Arc<SemanticParser>,
    pub embedding_client: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub validation_cache: Arc<ValidationCache>,
    pub request_cache: Arc<RequestCache>,
    pub config: Arc<AppConfig>,
    pub retriever_id: String,
    pub reranker_id: String,
    pub config_fingerprint: String,
}

impl Engine {
    /// `standardize_exam` per the algorithm in the component design:
    /// validation short-circuit, parse, retrieve, rerank, score, veto,
    /// select, emit.
    #[instrument(skip(self, raw_exam), fields(exam = %raw_exam))]
    pub async fn standardize_exam(
        &self,
        raw_exam: &str,
        modality_hint: &str,
        data_source: &str,
    ) -> Result<MatchResult, EngineError> {
        let request_key = hash_request_key(raw_exam, modality_hint, data_source);

        // 1. Validation short-circuit.
        if let Some(mapping) = self.validation_cache.approved(&request_key) {
            let mut winner = Candidate::new(mapping.clone(), 1.0);
            winner.rerank_score = Some(1.0);
            winner.component_score = 1.0;
            winner.final_score = 1.0;
            return Ok(MatchResult::from_winner(
                ParsedExam::default(),
                Some(winner.clone()),
                vec![winner],
                ValidationStatus::ApprovedByHuman,
            ));
        }

        // 2. Parse.
        let input_parsed = self
            .parser
            .parse(raw_exam, modality_hint, &self.config.interventional_evidence);

        let cache_key = RequestCacheKey {
            preprocessed_exam: input_parsed.preprocessed.clone(),
            modality_hint: modality_hint.to_string(),
            retriever_id: self.retriever_id.clone(),
            reranker_id: self.reranker_id.clone(),
            config_fingerprint: self.config_fingerprint.clone(),
        };
        if let Some(cached) = self.request_cache.get(&cache_key) {
            return Ok(cached);
        }

        // 3. Retrieve.
        let rejected_ids = self.validation_cache.rejected(&request_key);
        let candidates = self.retrieve(&input_parsed, &rejected_ids).await?;

        // 4. Rerank.
        let reranked = self.reranker.rerank(&input_parsed, candidates).await?;

        // 5-7. Score, veto, fuse.
        let scored = self.score_and_veto(&input_parsed, reranked);

        // 8. Select winner.
        let (winner, all_candidates) = select_winner(scored, &self.config.scoring);

        let result = MatchResult::from_winner(input_parsed, winner, all_candidates, ValidationStatus::None);
        self.request_cache.put(cache_key, result.clone());
        Ok(result)
    }

    async fn retrieve(
        &self,
        input_parsed: &ParsedExam,
        rejected_ids: &HashSet<String>,
    ) -> Result<Vec<Candidate>, EngineError> {
        let embeddings = self
            .embedding_client
            .embed(std::slice::from_ref(&input_parsed.preprocessed))
            .await?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::RemoteFailure(RemoteError::Failure("empty embed response".into())))?;

        let hits = self.index.topk(&query_vector, self.config.scoring.k_retrieve);

        let mut candidates = Vec::with_capacity(hits.len());
        for (id, similarity) in hits {
            if rejected_ids.contains(&id) {
                continue;
            }
            let Some(entry) = self.catalog.get(&id) else {
                continue;
            };
            if rejected_ids.contains(&entry.snomed_concept_id) {
                continue;
            }
            candidates.push(Candidate::new(entry.clone(), similarity));
        }
        Ok(candidates)
    }

    fn score_and_veto(&self, input_parsed: &ParsedExam, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let scoring = &self.config.scoring;
        for candidate in &mut candidates {
            candidate.component_score = component_alignment_score(input_parsed, &candidate.entry.parsed, scoring);

            if let Some(reason) = clinical_safety_veto(input_parsed, &candidate.entry.parsed) {
                candidate.veto(reason);
                continue;
            }

            let rerank_score = candidate.rerank_score.unwrap_or(candidate.dense_score);
            candidate.final_score =
                scoring.w_rerank * rerank_score + scoring.w_component * candidate.component_score;
        }
        candidates
    }
}

fn hash_request_key(raw_exam: &str, modality_hint: &str, data_source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_exam.as_bytes());
    hasher.update(b"\0");
    hasher.update(modality_hint.as_bytes());
    hasher.update(b"\0");
    hasher.update(data_source.as_bytes());
    hex::encode(hasher.finalize())
}

fn component_alignment_score(query: &ParsedExam, candidate: &ParsedExam, scoring: &ScoringConfig) -> f32 {
    let modality_match = (!query.modality.is_empty()
        && !candidate.modality.is_empty()
        && query.modality == candidate.modality) as u8 as f32;
    let anatomy = query.anatomy_jaccard(candidate);
    let laterality = laterality_alignment(query.laterality, candidate.laterality);
    let contrast = contrast_alignment(query.contrast, candidate.contrast);
    let technique = query.technique_jaccard(candidate);
    let context = query.context_overlap(candidate);

    scoring.w_modality * modality_match
        + scoring.w_anatomy * anatomy
        + scoring.w_laterality * laterality
        + scoring.w_contrast * contrast
        + scoring.w_technique * technique
        + scoring.w_context * context
}

fn laterality_alignment(query: Laterality, candidate: Laterality) -> f32 {
    if query == Laterality::None || candidate == Laterality::None {
        return 1.0;
    }
    (query == candidate) as u8 as f32
}

fn contrast_alignment(query: Contrast, candidate: Contrast) -> f32 {
    if query == Contrast::WithAndWithout || candidate == Contrast::WithAndWithout {
        return 1.0;
    }
    (query == candidate) as u8 as f32
}

/// Returns `Some(reason)` if a hard clinical-safety veto applies.
fn clinical_safety_veto(query: &ParsedExam, candidate: &ParsedExam) -> Option<String> {
    if modality_conflict(&query.modality, &candidate.modality) {
        return Some(format!(
            "modality conflict: query={} candidate={}",
            query.modality, candidate.modality
        ));
    }

    if laterality_conflict(query, candidate) {
        return Some(format!(
            "laterality conflict: query={:?} candidate={:?}",
            query.laterality, candidate.laterality
        ));
    }

    if contrast_conflict(query.contrast, candidate.contrast) {
        return Some(format!(
            "contrast conflict: query={:?} candidate={:?}",
            query.contrast, candidate.contrast
        ));
    }

    if interventional_conflict(query, candidate) {
        return Some("interventional/diagnostic conflict".to_string());
    }

    None
}

fn modality_conflict(query: &str, candidate: &str) -> bool {
    if query.is_empty() || candidate.is_empty() || query == candidate {
        return false;
    }
    if MODALITY_EQUIVALENCE_CLASS.contains(&query) && MODALITY_EQUIVALENCE_CLASS.contains(&candidate) {
        return false;
    }
    true
}

fn laterality_conflict(query: &ParsedExam, candidate: &ParsedExam) -> bool {
    match (query.laterality, candidate.laterality) {
        (Laterality::Left, Laterality::Right) | (Laterality::Right, Laterality::Left) => true,
        (Laterality::Bilateral, single) | (single, Laterality::Bilateral) => {
            matches!(single, Laterality::Left | Laterality::Right)
                && candidate.anatomy.iter().any(|a| PAIRED_ANATOMY.contains(&a.as_str()))
        }
        _ => false,
    }
}

fn contrast_conflict(query: Contrast, candidate: Contrast) -> bool {
    matches!(
        (query, candidate),
        (Contrast::With, Contrast::Without) | (Contrast::Without, Contrast::With)
    )
}

fn interventional_conflict(query: &ParsedExam, candidate: &ParsedExam) -> bool {
    let xor = query.is_interventional != candidate.is_interventional;
    xor && (query.is_interventional || candidate.is_interventional)
}

fn select_winner(mut candidates: Vec<Candidate>, scoring: &ScoringConfig) -> (Option<Candidate>, Vec<Candidate>) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.dense_score.partial_cmp(&a.dense_score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });

    let winner = candidates
        .iter()
        .find(|c| !c.vetoed && c.final_score >= scoring.confidence_floor)
        .cloned();

    if candidates.is_empty() {
        warn!("no candidates retrieved for request");
    } else if winner.is_none() {
        warn!("all candidates vetoed or below confidence floor");
    }

    candidates.truncate(scoring.top_n_candidates);
    (winner, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgeContext, GenderContext, ReferenceEntry};

    fn parsed(modality: &str, laterality: Laterality, contrast: Contrast, interventional: bool) -> ParsedExam {
        ParsedExam {
            raw: String::new(),
            preprocessed: String::new(),
            modality_hint: String::new(),
            modality: modality.to_string(),
            anatomy: vec!["knee".to_string()],
            laterality,
            contrast,
            technique: vec![],
            gender_context: GenderContext::None,
            age_context: AgeContext::None,
            clinical_context: vec![],
            is_interventional: interventional,
            is_diagnostic: !interventional,
            confidence: 1.0,
        }
    }

    fn entry(modality: &str, laterality: Laterality, contrast: Contrast, interventional: bool) -> ReferenceEntry {
        ReferenceEntry {
            id: "1".into(),
            snomed_concept_id: "".into(),
            snomed_fsn: "fsn".into(),
            clean_name: "clean".into(),
            parsed: parsed(modality, laterality, contrast, interventional),
            embedding: vec![],
        }
    }

    #[test]
    fn modality_conflict_blocks_ct_vs_mr() {
        assert!(modality_conflict("CT", "MR"));
    }

    #[test]
    fn modality_equivalence_class_does_not_conflict() {
        assert!(!modality_conflict("XR", "Mammography"));
    }

    #[test]
    fn empty_modality_never_conflicts() {
        assert!(!modality_conflict("", "CT"));
    }

    #[test]
    fn laterality_left_right_conflicts() {
        let query = parsed("CT", Laterality::Left, Contrast::None, false);
        let candidate = parsed("CT", Laterality::Right, Contrast::None, false);
        assert!(laterality_conflict(&query, &candidate));
    }

    #[test]
    fn bilateral_vs_single_sided_paired_anatomy_conflicts() {
        let query = parsed("CT", Laterality::Bilateral, Contrast::None, false);
        let candidate = parsed("CT", Laterality::Left, Contrast::None, false);
        assert!(laterality_conflict(&query, &candidate));
    }

    #[test]
    fn contrast_with_vs_without_conflicts() {
        assert!(contrast_conflict(Contrast::With, Contrast::Without));
    }

    #[test]
    fn with_and_without_never_conflicts() {
        assert!(!contrast_conflict(Contrast::WithAndWithout, Contrast::Without));
    }

    #[test]
    fn interventional_vs_diagnostic_conflicts() {
        let query = parsed("XA", Laterality::None, Contrast::None, true);
        let candidate = parsed("CT", Laterality::None, Contrast::None, false);
        assert!(interventional_conflict(&query, &candidate));
    }

    #[test]
    fn veto_zeroes_final_score_via_score_and_veto_path() {
        let query = parsed("CT", Laterality::None, Contrast::None, false);
        let mut candidate = Candidate::new(entry("MR", Laterality::None, Contrast::None, false), 0.9);
        candidate.rerank_score = Some(0.9);
        let reason = clinical_safety_veto(&query, &candidate.entry.parsed);
        assert!(reason.is_some());
    }

    #[test]
    fn select_winner_applies_confidence_floor() {
        let scoring = ScoringConfig::default();
        let mut low = Candidate::new(entry("CT", Laterality::None, Contrast::None, false), 0.5);
        low.final_score = 0.1;
        let (winner, _) = select_winner(vec![low], &scoring);
        assert!(winner.is_none());
    }

    #[test]
    fn select_winner_breaks_ties_by_id() {
        let scoring = ScoringConfig::default();
        let mut a = Candidate::new(entry("CT", Laterality::None, Contrast::None, false), 0.5);
        a.entry.id = "b".into();
        a.final_score = 0.9;
        a.dense_score = 0.5;
        let mut b = Candidate::new(entry("CT", Laterality::None, Contrast::None, false), 0.5);
        b.entry.id = "a".into();
        b.final_score = 0.9;
        b.dense_score = 0.5;
        let (winner, _) = select_winner(vec![a, b], &scoring);
        assert_eq!(winner.unwrap().entry.id, "a");
    }
}
