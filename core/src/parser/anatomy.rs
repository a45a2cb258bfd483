//! Anatomy vocabulary and longest-match extraction (step 4).

/// Canonical anatomy terms in the cranial-to-caudal order used to order
/// extraction results. Multi-word terms are matched as contiguous token
/// runs before single-word terms, so `"lumbar spine"` wins over a bare
/// `"spine"` match.
const ANATOMY_TERMS: &[&str] = &[
    "brain",
    "head",
    "neck",
    "cervical spine",
    "thoracic spine",
    "lumbar spine",
    "spine",
    "chest",
    "thorax",
    "breast",
    "heart",
    "abdomen",
    "pelvis",
    "liver",
    "kidney",
    "kidneys",
    "renal",
    "bladder",
    "prostate",
    "uterus",
    "ovary",
    "shoulder",
    "elbow",
    "wrist",
    "hand",
    "hip",
    "knee",
    "ankle",
    "foot",
    "femur",
    "tibia",
    "humerus",
    "spleen",
    "pancreas",
    "aorta",
    "carotid",
    "extremity",
];

pub struct AnatomyVocabulary {
    terms: Vec<&'static str>,
}

impl Default for AnatomyVocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl AnatomyVocabulary {
    pub fn new() -> Self {
        let mut terms: Vec<&'static str> = ANATOMY_TERMS.to_vec();
        // Longest term first so multi-word terms match before their
        // single-word substrings.
        terms.sort_by_key(|t| std::cmp::Reverse(t.split_whitespace().count()));
        Self { terms }
    }

    /// True if `token` (a single whitespace-delimited word) is itself a
    /// recognized anatomy term, used by the abbreviation expander to avoid
    /// overwriting anatomy tokens during expansion.
    pub fn is_anatomy_token(&self, token: &str) -> bool {
        ANATOMY_TERMS.contains(&token)
    }

    /// Longest-match extraction over `preprocessed`, preserving vocabulary
    /// order (cranial-to-caudal) and deduplicating.
    pub fn extract(&self, preprocessed: &str) -> Vec<String> {
        let words: Vec<&str> = preprocessed.split_whitespace().collect();
        let mut consumed = vec![false; words.len()];
        let mut found: Vec<&'static str> = Vec::new();

        for term in &self.terms {
            let term_words: Vec<&str> = term.split_whitespace().collect();
            let span = term_words.len();
            if span == 0 || span > words.len() {
                continue;
            }
            for start in 0..=(words.len() - span) {
                if consumed[start..start + span].iter().any(|&c| c) {
                    continue;
                }
                if words[start..start + span]
                    .iter()
                    .zip(term_words.iter())
                    .all(|(w, t)| w == t)
                {
                    for slot in consumed.iter_mut().skip(start).take(span) {
                        *slot = true;
                    }
                    if !found.contains(term) {
                        found.push(term);
                    }
                }
            }
        }

        // Restore vocabulary (cranial-to-caudal) order rather than the
        // longest-first scan order.
        let mut ordered: Vec<&'static str> = ANATOMY_TERMS
            .iter()
            .filter(|t| found.contains(t))
            .copied()
            .collect();
        ordered.dedup();
        ordered.into_iter().map(|s| s.to_string()).collect()
    }
}
