//! Step 8 of the parsing pipeline: gender, age, and clinical context
//! detection from keyword tables.

use crate::types::{AgeContext, GenderContext};

const CLINICAL_CONTEXT_TERMS: &[&str] = &[
    "trauma",
    "oncology",
    "staging",
    "follow up",
    "screening",
    "emergency",
    "post operative",
    "pre operative",
    "cardiac",
    "stroke protocol",
];

pub struct ContextDetector;

impl Default for ContextDetector {
    fn default() -> Self {
        Self
    }
}

impl ContextDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect_gender(&self, preprocessed: &str) -> GenderContext {
        let tokens: Vec<&str> = preprocessed.split_whitespace().collect();
        if preprocessed.contains("pregnan") {
            GenderContext::Pregnancy
        } else if tokens.iter().any(|&t| t == "female" || t == "woman") {
            GenderContext::Female
        } else if tokens.iter().any(|&t| t == "male" || t == "man") {
            GenderContext::Male
        } else {
            GenderContext::None
        }
    }

    pub fn detect_age(&self, preprocessed: &str) -> AgeContext {
        let tokens: Vec<&str> = preprocessed.split_whitespace().collect();
        if tokens.iter().any(|&t| {
            t == "paediatric" || t == "pediatric" || t == "child" || t == "infant" || t == "neonatal"
        }) {
            AgeContext::Paediatric
        } else if tokens.iter().any(|&t| t == "adult") {
            AgeContext::Adult
        } else {
            AgeContext::None
        }
    }

    pub fn detect_clinical(&self, preprocessed: &str) -> Vec<String> {
        CLINICAL_CONTEXT_TERMS
            .iter()
            .filter(|term| contains_whole_phrase(preprocessed, term))
            .map(|s| s.to_string())
            .collect()
    }
}

fn contains_whole_phrase(haystack: &str, phrase: &str) -> bool {
    let phrase_words: Vec<&str> = phrase.split_whitespace().collect();
    let words: Vec<&str> = haystack.split_whitespace().collect();
    let span = phrase_words.len();
    if span == 0 || span > words.len() {
        return false;
    }
    (0..=(words.len() - span)).any(|start| words[start..start + span] == phrase_words[..])
}
