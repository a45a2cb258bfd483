//! Core data model shared across the standardization pipeline.

use serde::{Deserialize, Serialize};

/// Left/right/bilateral qualifier extracted from an exam string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Laterality {
    Left,
    Right,
    Bilateral,
    None,
}

impl Default for Laterality {
    fn default() -> Self {
        Laterality::None
    }
}

/// Contrast administration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Contrast {
    With,
    Without,
    WithAndWithout,
    None,
}

impl Default for Contrast {
    fn default() -> Self {
        Contrast::None
    }
}

/// Gender-specific clinical context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderContext {
    Male,
    Female,
    Pregnancy,
    None,
}

impl Default for GenderContext {
    fn default() -> Self {
        GenderContext::None
    }
}

/// Age-related clinical context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeContext {
    Paediatric,
    Adult,
    None,
}

impl Default for AgeContext {
    fn default() -> Self {
        AgeContext::None
    }
}

/// The result of decomposing a raw exam string (+ modality hint) into
/// structured components. Produced by `SemanticParser::parse`; pure and
/// infallible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedExam {
    pub raw: String,
    pub preprocessed: String,
    pub modality_hint: String,
    pub modality: String,
    pub anatomy: Vec<String>,
    pub laterality: Laterality,
    pub contrast: Contrast,
    pub technique: Vec<String>,
    pub gender_context: GenderContext,
    pub age_context: AgeContext,
    pub clinical_context: Vec<String>,
    pub is_interventional: bool,
    pub is_diagnostic: bool,
    pub confidence: f32,
}

impl ParsedExam {
    /// Jaccard overlap between this exam's anatomy set and another's.
    pub fn anatomy_jaccard(&self, other: &ParsedExam) -> f32 {
        jaccard(&self.anatomy, &other.anatomy)
    }

    /// Jaccard overlap between this exam's technique set and another's.
    pub fn technique_jaccard(&self, other: &ParsedExam) -> f32 {
        jaccard(&self.technique, &other.technique)
    }

    /// Context alignment score: the average of gender equality, age
    /// equality, and clinical-context Jaccard overlap.
    pub fn context_overlap(&self, other: &ParsedExam) -> f32 {
        let gender_match = (self.gender_context == other.gender_context) as u8 as f32;
        let age_match = (self.age_context == other.age_context) as u8 as f32;
        let clinical_j = jaccard(&self.clinical_context, &other.clinical_context);
        (gender_match + age_match + clinical_j) / 3.0
    }
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let set_a: std::collections::HashSet<&String> = a.iter().collect();
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// One row of the authoritative procedure catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub snomed_concept_id: String,
    pub snomed_fsn: String,
    pub clean_name: String,
    pub parsed: ParsedExam,
    pub embedding: Vec<f32>,
}

impl ReferenceEntry {
    /// The text embedded for this entry: `clean_name + " | " + snomed_fsn`,
    /// standardized for both the catalog index and reranker documents.
    pub fn embedding_text(&self) -> String {
        format!("{} | {}", self.clean_name, self.snomed_fsn)
    }
}

/// A single retrieved-and-scored catalog entry for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub entry: ReferenceEntry,
    pub dense_score: f32,
    pub rerank_score: Option<f32>,
    pub component_score: f32,
    pub vetoed: bool,
    pub veto_reason: String,
    pub final_score: f32,
}

impl Candidate {
    pub fn new(entry: ReferenceEntry, dense_score: f32) -> Self {
        Self {
            entry,
            dense_score: dense_score.clamp(0.0, 1.0),
            rerank_score: None,
            component_score: 0.0,
            vetoed: false,
            veto_reason: String::new(),
            final_score: 0.0,
        }
    }

    pub fn veto(&mut self, reason: impl Into<String>) {
        self.vetoed = true;
        self.veto_reason = reason.into();
        self.final_score = 0.0;
    }
}

/// SNOMED identifiers surfaced on a `MatchResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnomedRef {
    pub id: String,
    pub fsn: String,
}

/// How a returned mapping was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    None,
    ApprovedByHuman,
    Auto,
}

impl Default for ValidationStatus {
    fn default() -> Self {
        ValidationStatus::None
    }
}

/// The result of standardizing one exam name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub input: ParsedExam,
    pub winner: Option<Candidate>,
    pub all_candidates: Vec<Candidate>,
    pub clean_name: String,
    pub snomed: SnomedRef,
    pub confidence: f32,
    pub validation_status: ValidationStatus,
}

impl MatchResult {
    /// Build a `MatchResult` from a winner candidate (or none) plus the
    /// candidates to surface for disclosure/debugging.
    pub fn from_winner(
        input: ParsedExam,
        winner: Option<Candidate>,
        all_candidates: Vec<Candidate>,
        validation_status: ValidationStatus,
    ) -> Self {
        let (clean_name, snomed, confidence) = match &winner {
            Some(c) => (
                c.entry.clean_name.clone(),
                SnomedRef {
                    id: c.entry.snomed_concept_id.clone(),
                    fsn: c.entry.snomed_fsn.clone(),
                },
                c.final_score,
            ),
            None => (String::new(), SnomedRef::default(), 0.0),
        };

        Self {
            input,
            winner,
            all_candidates,
            clean_name,
            snomed,
            confidence,
            validation_status,
        }
    }
}

/// An approved or rejected human validation decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub request_key: String,
    pub status: ValidationRecordStatus,
    pub note: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ValidationRecordStatus {
    Approved { mapping: ReferenceEntry },
    Rejected { excluded_ids: Vec<String> },
    Deferred,
}
