//! Step 2 of the parsing pipeline: whole-token abbreviation expansion.

use crate::parser::anatomy::AnatomyVocabulary;

/// Abbreviation table as (abbreviation, expansion) pairs. Expansion is
/// whole-token: an abbreviation only fires when it occupies an entire
/// token, never as a substring.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("br", "breast"),
    ("ugi", "upper gi"),
    ("w/", "with"),
    ("w", "with"),
    ("c+", "with contrast"),
    ("nc", "non contrast"),
    ("bilat", "bilateral"),
    ("abd", "abdomen"),
    ("pelv", "pelvis"),
    ("ext", "extremity"),
    ("l spine", "lumbar spine"),
    ("c spine", "cervical spine"),
    ("t spine", "thoracic spine"),
    ("wo", "without"),
    ("w/o", "without"),
    ("rt", "right"),
    ("lt", "left"),
    ("mammo", "mammography"),
    ("angio", "angiography"),
    ("ba", "barium study"),
];

pub struct AbbreviationExpander {
    /// Sorted longest-token-count first, so multi-word abbreviations like
    /// `"l spine"` are tried before single-token ones.
    table: Vec<(&'static str, &'static str)>,
}

impl Default for AbbreviationExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl AbbreviationExpander {
    pub fn new() -> Self {
        let mut table: Vec<(&'static str, &'static str)> = ABBREVIATIONS.to_vec();
        table.sort_by_key(|(abbrev, _)| std::cmp::Reverse(abbrev.split_whitespace().count()));
        Self { table }
    }

    /// Expands whole-token abbreviations in `preprocessed`. Tokens already
    /// present in `anatomy` are never overwritten, since an anatomy term
    /// may coincidentally collide with an abbreviation key (e.g. `"rt"`
    /// conflicts with nothing here, but the guard matches the contract).
    pub fn expand(&self, preprocessed: &str, anatomy: &AnatomyVocabulary) -> String {
        let words: Vec<&str> = preprocessed.split_whitespace().collect();
        let mut consumed = vec![false; words.len()];
        let mut output: Vec<Option<String>> = vec![None; words.len()];

        for (abbrev, expansion) in &self.table {
            let abbrev_words: Vec<&str> = abbrev.split_whitespace().collect();
            let span = abbrev_words.len();
            if span == 0 || span > words.len() {
                continue;
            }
            for start in 0..=(words.len() - span) {
                if consumed[start..start + span].iter().any(|&c| c) {
                    continue;
                }
                if words[start..start + span]
                    .iter()
                    .zip(abbrev_words.iter())
                    .all(|(w, a)| w == a)
                {
                    if anatomy.is_anatomy_token(words[start]) {
                        continue;
                    }
                    output[start] = Some(expansion.to_string());
                    for slot in consumed.iter_mut().skip(start).take(span) {
                        *slot = true;
                    }
                }
            }
        }

        let mut result_tokens: Vec<String> = Vec::new();
        let mut i = 0;
        while i < words.len() {
            if let Some(replacement) = &output[i] {
                result_tokens.push(replacement.clone());
                // Skip the rest of the tokens this abbreviation consumed.
                let mut j = i + 1;
                while j < words.len() && consumed[j] && output[j].is_none() {
                    j += 1;
                }
                i = j;
            } else if consumed[i] {
                i += 1;
            } else {
                result_tokens.push(words[i].to_string());
                i += 1;
            }
        }

        result_tokens.join(" ")
    }
}
