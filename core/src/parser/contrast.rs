//! Step 6 of the parsing pipeline: contrast state detection.

use crate::types::Contrast;

pub struct ContrastMapper;

impl Default for ContrastMapper {
    fn default() -> Self {
        Self
    }
}

impl ContrastMapper {
    pub fn new() -> Self {
        Self
    }

    /// Detects `with contrast`, `without contrast` (including the
    /// `non contrast`/`non-contrast` spellings, already normalized to
    /// `non contrast` by this point), or both → `with-and-without`.
    pub fn detect(&self, preprocessed: &str) -> Contrast {
        let tokens: Vec<&str> = preprocessed.split_whitespace().collect();
        let has_both = contains_whole_phrase(preprocessed, "with and without");
        let has_without = contains_whole_phrase(preprocessed, "without contrast")
            || contains_whole_phrase(preprocessed, "non contrast")
            || tokens.iter().any(|&t| t == "without");
        let has_with = contains_whole_phrase(preprocessed, "with contrast")
            || (tokens.iter().any(|&t| t == "with") && !has_without && !has_both);

        if has_both || (has_with && has_without) {
            Contrast::WithAndWithout
        } else if has_with {
            Contrast::With
        } else if has_without {
            Contrast::Without
        } else {
            Contrast::None
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_with_contrast() {
        let mapper = ContrastMapper::new();
        assert_eq!(mapper.detect("ct abdomen with contrast"), Contrast::With);
    }

    #[test]
    fn detects_without_contrast() {
        let mapper = ContrastMapper::new();
        assert_eq!(mapper.detect("ct abdomen non contrast"), Contrast::Without);
    }

    #[test]
    fn detects_with_and_without() {
        let mapper = ContrastMapper::new();
        assert_eq!(
            mapper.detect("ct abdomen with and without contrast"),
            Contrast::WithAndWithout
        );
    }

    #[test]
    fn detects_both_mentioned_separately() {
        let mapper = ContrastMapper::new();
        assert_eq!(
            mapper.detect("ct abdomen with contrast and without contrast"),
            Contrast::WithAndWithout
        );
    }

    #[test]
    fn defaults_to_none() {
        let mapper = ContrastMapper::new();
        assert_eq!(mapper.detect("ct chest routine"), Contrast::None);
    }

    #[test]
    fn within_is_not_mistaken_for_with() {
        let mapper = ContrastMapper::new();
        assert_eq!(
            mapper.detect("ct chest follow up within 6 months"),
            Contrast::None
        );
    }
}
