//! Step 5 of the parsing pipeline: laterality detection.

use crate::types::Laterality;

pub struct LateralityDetector;

impl Default for LateralityDetector {
    fn default() -> Self {
        Self
    }
}

impl LateralityDetector {
    pub fn new() -> Self {
        Self
    }

    /// First of {bilateral, left, right} present in `preprocessed`; else
    /// `Laterality::None`. Bilateral is checked first since `"bilateral"`
    /// would otherwise never win against an incidental `"left"`/`"right"`
    /// token appearing elsewhere in the same string.
    pub fn detect(&self, preprocessed: &str) -> Laterality {
        let tokens: Vec<&str> = preprocessed.split_whitespace().collect();
        if tokens.iter().any(|&t| t == "bilateral" || t == "both") {
            return Laterality::Bilateral;
        }
        if tokens.iter().any(|&t| t == "left") {
            return Laterality::Left;
        }
        if tokens.iter().any(|&t| t == "right") {
            return Laterality::Right;
        }
        Laterality::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bilateral() {
        let detector = LateralityDetector::new();
        assert_eq!(detector.detect("ct both knees"), Laterality::Bilateral);
    }

    #[test]
    fn detects_left() {
        let detector = LateralityDetector::new();
        assert_eq!(detector.detect("mri left knee"), Laterality::Left);
    }

    #[test]
    fn detects_right() {
        let detector = LateralityDetector::new();
        assert_eq!(detector.detect("xray right wrist"), Laterality::Right);
    }

    #[test]
    fn defaults_to_none() {
        let detector = LateralityDetector::new();
        assert_eq!(detector.detect("ct chest"), Laterality::None);
    }

    #[test]
    fn bilateral_takes_precedence() {
        let detector = LateralityDetector::new();
        assert_eq!(
            detector.detect("bilateral left sided finding"),
            Laterality::Bilateral
        );
    }
}
