//! The deterministic, pure exam-string parsing pipeline.
//!
//! `SemanticParser::parse` is the sole entry point; the submodules are
//! implementation detail, each independently unit-tested.

mod abbreviation;
mod anatomy;
mod context;
mod contrast;
mod laterality;
mod modality;
mod normalize;
mod technique;

use crate::config::InterventionalEvidenceConfig;
use crate::types::ParsedExam;

use abbreviation::AbbreviationExpander;
use anatomy::AnatomyVocabulary;
use context::ContextDetector;
use contrast::ContrastMapper;
use laterality::LateralityDetector;
use modality::ModalityDetector;
use technique::TechniqueExtractor;

const MISSING_MODALITY_PENALTY: f32 = 0.3;
const EMPTY_ANATOMY_PENALTY: f32 = 0.3;

/// Composes the extractors into the ten-step parsing algorithm. Holds no
/// mutable state; safe to share behind an `Arc` across the catalog loader
/// and every request.
pub struct SemanticParser {
    abbreviations: AbbreviationExpander,
    anatomy: AnatomyVocabulary,
    laterality: LateralityDetector,
    contrast: ContrastMapper,
    technique: TechniqueExtractor,
    context: ContextDetector,
    modality: ModalityDetector,
}

impl Default for SemanticParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticParser {
    pub fn new() -> Self {
        Self {
            abbreviations: AbbreviationExpander::new(),
            anatomy: AnatomyVocabulary::new(),
            laterality: LateralityDetector::new(),
            contrast: ContrastMapper::new(),
            technique: TechniqueExtractor::new(),
            context: ContextDetector::new(),
            modality: ModalityDetector::new(),
        }
    }

    /// Decomposes `raw` (+ `modality_hint`) into a `ParsedExam`. Never
    /// raises; an empty `raw` yields a `ParsedExam` with confidence 0.
    pub fn parse(
        &self,
        raw: &str,
        modality_hint: &str,
        evidence: &InterventionalEvidenceConfig,
    ) -> ParsedExam {
        // 1. Normalize.
        let base = normalize::normalize(raw);

        // 2. Expand abbreviations.
        let preprocessed = self.abbreviations.expand(&base, &self.anatomy);

        // 4. Extract anatomy (computed before technique/context so modality
        // inference has whatever signal it needs, but after step 2 as the
        // algorithm requires).
        let anatomy = self.anatomy.extract(&preprocessed);

        // 5. Detect laterality.
        let laterality = self.laterality.detect(&preprocessed);

        // 6. Detect contrast.
        let contrast = self.contrast.detect(&preprocessed);

        // 7. Extract technique.
        let technique = self.technique.extract(&preprocessed);

        // 8. Detect contexts.
        let gender_context = self.context.detect_gender(&preprocessed);
        let age_context = self.context.detect_age(&preprocessed);
        let clinical_context = self.context.detect_clinical(&preprocessed);

        let has_interventional_context = technique
            .iter()
            .any(|t| evidence.interventional_techniques.contains(t))
            || clinical_context
                .iter()
                .any(|c| evidence.interventional_clinical_context.contains(c));

        // 3. Detect modality (needs technique for mammography/barium/
        // angiography inference, so it runs after step 7 in this
        // implementation even though it is numbered third in the
        // contract; the observable precedence — explicit token > hint >
        // technique inference — is unaffected by evaluation order).
        let modality = self.modality.detect(
            &preprocessed,
            modality_hint,
            &technique,
            has_interventional_context,
        );

        // 9. Derive predicates.
        let is_interventional = technique
            .iter()
            .any(|t| evidence.interventional_techniques.contains(t))
            || modality == "XA";
        let is_diagnostic =
            !is_interventional && evidence.diagnostic_modalities.contains(&modality);

        // 10. Compute parse confidence.
        let mut confidence = 1.0f32;
        if modality.is_empty() {
            confidence -= MISSING_MODALITY_PENALTY;
        }
        if anatomy.is_empty() {
            confidence -= EMPTY_ANATOMY_PENALTY;
        }
        confidence = confidence.max(0.0);

        ParsedExam {
            raw: raw.to_string(),
            preprocessed,
            modality_hint: modality_hint.to_string(),
            modality,
            anatomy,
            laterality,
            contrast,
            technique,
            gender_context,
            age_context,
            clinical_context,
            is_interventional,
            is_diagnostic,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence() -> InterventionalEvidenceConfig {
        InterventionalEvidenceConfig::default()
    }

    #[test]
    fn parses_simple_ct_chest() {
        let parser = SemanticParser::new();
        let parsed = parser.parse("CT Chest With Contrast", "", &evidence());
        assert_eq!(parsed.modality, "CT");
        assert_eq!(parsed.anatomy, vec!["chest".to_string()]);
        assert_eq!(parsed.contrast, crate::types::Contrast::With);
        assert!((parsed.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_input_yields_zero_confidence() {
        let parser = SemanticParser::new();
        let parsed = parser.parse("", "", &evidence());
        assert!(parsed.anatomy.is_empty());
        assert!(parsed.confidence.abs() < 1e-6);
    }

    #[test]
    fn missing_modality_only_incurs_partial_penalty() {
        let parser = SemanticParser::new();
        let parsed = parser.parse("left knee routine", "", &evidence());
        assert_eq!(parsed.modality, "");
        assert!(!parsed.anatomy.is_empty());
        assert!((parsed.confidence - (1.0 - MISSING_MODALITY_PENALTY)).abs() < 1e-6);
    }

    #[test]
    fn interventional_technique_sets_predicate() {
        let parser = SemanticParser::new();
        let parsed = parser.parse("angioplasty right leg", "", &evidence());
        assert!(parsed.is_interventional);
        assert!(!parsed.is_diagnostic);
    }

    #[test]
    fn angiography_context_confirmation_is_config_driven_not_hard_coded() {
        let parser = SemanticParser::new();

        // Default evidence only recognizes "trauma"; "emergency" alone
        // does not confirm vascular intent for a bare angiography token.
        let parsed = parser.parse("angiography leg emergency", "", &evidence());
        assert_eq!(parsed.modality, "");

        // Reconfiguring the evidence set to recognize "emergency" instead
        // changes the outcome without touching parser code.
        let mut custom_evidence = evidence();
        custom_evidence.interventional_clinical_context = vec!["emergency".to_string()];
        let parsed = parser.parse("angiography leg emergency", "", &custom_evidence);
        assert_eq!(parsed.modality, "XA");
    }

    #[test]
    fn diagnostic_ct_is_not_interventional() {
        let parser = SemanticParser::new();
        let parsed = parser.parse("ct chest routine", "", &evidence());
        assert!(!parsed.is_interventional);
        assert!(parsed.is_diagnostic);
    }

    #[test]
    fn catalog_and_input_parses_are_identical_for_same_text() {
        let parser = SemanticParser::new();
        let a = parser.parse("mri lumbar spine with contrast", "", &evidence());
        let b = parser.parse("MRI Lumbar Spine With Contrast", "", &evidence());
        assert_eq!(a.anatomy, b.anatomy);
        assert_eq!(a.modality, b.modality);
        assert_eq!(a.contrast, b.contrast);
    }
}
