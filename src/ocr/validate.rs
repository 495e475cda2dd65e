//! Recognition-quality checks on extracted text.
//!
//! Validation is non-destructive: the report carries the original counts and
//! a `cleaned_text` that only differs from the input when whitespace had to
//! be collapsed. Each check runs independently of the others.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratio of symbol characters above which text is flagged as noisy.
pub const PUNCTUATION_NOISE_RATIO: f64 = 0.30;

/// One quality anomaly found in extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssue {
    NoText,
    ExcessiveWhitespace,
    /// Informational; localized charts legitimately contain non-ASCII text.
    NonAscii,
    HighPunctuationRatio,
}

impl ValidationIssue {
    pub fn description(self) -> &'static str {
        match self {
            ValidationIssue::NoText => "no text extracted",
            ValidationIssue::ExcessiveWhitespace => "excessive whitespace",
            ValidationIssue::NonAscii => "non-ASCII characters detected",
            ValidationIssue::HighPunctuationRatio => "high punctuation ratio, potential noise",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Length of the input in characters.
    pub original_length: usize,
    pub has_content: bool,
    pub line_count: usize,
    pub word_count: usize,
    pub issues: Vec<ValidationIssue>,
    pub cleaned_text: String,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_issue(&self, issue: ValidationIssue) -> bool {
        self.issues.contains(&issue)
    }
}

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Inspect `text` for recognition anomalies.
pub fn validate(text: &str) -> ValidationReport {
    let original_length = text.chars().count();
    let has_content = !text.trim().is_empty();
    let mut issues = Vec::new();
    let mut cleaned_text = text.to_string();

    if !has_content {
        issues.push(ValidationIssue::NoText);
    }

    if text.contains("  ") {
        issues.push(ValidationIssue::ExcessiveWhitespace);
        cleaned_text = RE_WHITESPACE_RUN.replace_all(text, " ").into_owned();
    }

    if !text.is_ascii() {
        issues.push(ValidationIssue::NonAscii);
    }

    let symbols = RE_SYMBOL.find_iter(text).count();
    if symbols as f64 / original_length.max(1) as f64 > PUNCTUATION_NOISE_RATIO {
        issues.push(ValidationIssue::HighPunctuationRatio);
    }

    ValidationReport {
        original_length,
        has_content,
        line_count: text.split('\n').count(),
        word_count: text.split_whitespace().count(),
        issues,
        cleaned_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_have_no_content() {
        for input in ["", "   "] {
            let r = validate(input);
            assert!(!r.has_content, "input {input:?}");
            assert!(r.has_issue(ValidationIssue::NoText), "input {input:?}");
        }
    }

    #[test]
    fn blank_input_also_flags_whitespace() {
        let r = validate("   ");
        assert_eq!(
            r.issues,
            vec![ValidationIssue::NoText, ValidationIssue::ExcessiveWhitespace]
        );
        assert_eq!(r.cleaned_text, " ");
    }

    #[test]
    fn double_space_is_collapsed() {
        let r = validate("a  b");
        assert!(r.has_issue(ValidationIssue::ExcessiveWhitespace));
        assert_eq!(r.cleaned_text, "a b");
    }

    #[test]
    fn collapse_includes_newlines() {
        let r = validate("Q1  100\nQ2 200");
        assert_eq!(r.cleaned_text, "Q1 100 Q2 200");
        assert_eq!(r.line_count, 2);
        assert_eq!(r.word_count, 4);
    }

    #[test]
    fn cleaned_text_is_stable() {
        let first = validate("Sales   2024 \t Q1");
        let second = validate(&first.cleaned_text);
        assert!(!second.has_issue(ValidationIssue::ExcessiveWhitespace));
        assert_eq!(second.cleaned_text, first.cleaned_text);
    }

    #[test]
    fn single_spaces_leave_text_untouched() {
        let r = validate("Q1 100\nQ2 200");
        assert!(r.is_clean());
        assert_eq!(r.cleaned_text, "Q1 100\nQ2 200");
    }

    #[test]
    fn non_ascii_is_informational() {
        let r = validate("Wydatki w złotych");
        assert_eq!(r.issues, vec![ValidationIssue::NonAscii]);
        assert!(r.has_content);
    }

    #[test]
    fn punctuation_noise() {
        let r = validate("#### ??? 1234");
        assert!(r.has_issue(ValidationIssue::HighPunctuationRatio));

        // 3 symbols out of 10 characters is exactly 0.30, not above it.
        let r = validate("a.b,c;defg");
        assert!(!r.has_issue(ValidationIssue::HighPunctuationRatio));
    }

    #[test]
    fn counts() {
        let r = validate("Sales 2024\nQ1 100\n");
        assert_eq!(r.original_length, 18);
        assert_eq!(r.line_count, 3);
        assert_eq!(r.word_count, 4);
    }

    #[test]
    fn issue_descriptions() {
        assert_eq!(ValidationIssue::NoText.to_string(), "no text extracted");
        assert_eq!(
            ValidationIssue::HighPunctuationRatio.to_string(),
            "high punctuation ratio, potential noise"
        );
    }
}
