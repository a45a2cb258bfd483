//! Step 1 of the parsing pipeline: lowercasing, punctuation normalization,
//! and trailing-parenthetical stripping.

/// Lowercases, collapses whitespace, replaces `/`, `-`, `_` with spaces,
/// and strips a trailing parenthetical note (e.g. `"ct chest (routine)"`
/// becomes `"ct chest"`).
pub fn normalize(raw: &str) -> String {
    let without_trailing_paren = strip_trailing_parenthetical(raw);
    let lowered = without_trailing_paren.to_lowercase();
    let punctuation_replaced: String = lowered
        .chars()
        .map(|c| match c {
            '/' | '-' | '_' => ' ',
            other => other,
        })
        .collect();
    collapse_whitespace(&punctuation_replaced)
}

fn strip_trailing_parenthetical(s: &str) -> String {
    let trimmed = s.trim_end();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            return trimmed[..open].trim_end().to_string();
        }
    }
    trimmed.to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize("CT   Chest   Routine"), "ct chest routine");
    }

    #[test]
    fn slash_becomes_space() {
        assert_eq!(normalize("CT Chest W/Contrast"), "ct chest w contrast");
    }

    #[test]
    fn replaces_punctuation_with_spaces() {
        assert_eq!(normalize("MRI L-spine_no-contrast"), "mri l spine no contrast");
    }

    #[test]
    fn strips_trailing_parenthetical() {
        assert_eq!(normalize("CT Abdomen Pelvis (routine protocol)"), "ct abdomen pelvis");
    }

    #[test]
    fn leaves_non_trailing_parenthetical_alone() {
        assert_eq!(normalize("(STAT) CT Head"), "(stat) ct head");
    }
}
