//! Step 7 of the parsing pipeline: technique extraction.
//!
//! Technique terms are distinct from contrast terms (step 6 already
//! consumed those) and from modality tokens (step 3).

const TECHNIQUE_TERMS: &[&str] = &[
    "angiography",
    "hrct",
    "perfusion",
    "mammography",
    "dexa",
    "barium study",
    "barium",
    "interventional",
    "angioplasty",
    "embolization",
    "stent placement",
    "biopsy interventional",
    "drainage",
    "functional",
    "diffusion",
    "spectroscopy",
];

pub struct TechniqueExtractor {
    terms: Vec<&'static str>,
}

impl Default for TechniqueExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TechniqueExtractor {
    pub fn new() -> Self {
        let mut terms: Vec<&'static str> = TECHNIQUE_TERMS.to_vec();
        terms.sort_by_key(|t| std::cmp::Reverse(t.split_whitespace().count()));
        Self { terms }
    }

    /// Extracts all technique terms present in `preprocessed`, deduplicated,
    /// in the order they occur in the vocabulary table.
    pub fn extract(&self, preprocessed: &str) -> Vec<String> {
        let mut found: Vec<&'static str> = Vec::new();
        for term in &self.terms {
            if contains_whole_phrase(preprocessed, term) && !found.contains(term) {
                found.push(term);
            }
        }
        // barium study subsumes barium; drop the redundant shorter form.
        if found.contains(&"barium study") {
            found.retain(|&t| t != "barium");
        }
        found.into_iter().map(|s| s.to_string()).collect()
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
