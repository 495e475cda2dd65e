//! Output types for a single chart analysis.

use crate::ocr::validate::ValidationReport;
use serde::{Deserialize, Serialize};

/// Substituted when OCR yields no text.
pub const NO_TEXT_FALLBACK: &str = "No text could be extracted from the file.";
/// Substituted when the interpretation stage returns nothing.
pub const NO_INSIGHTS_FALLBACK: &str = "Failed to generate key insights from the text.";
/// Substituted when the short summary returns nothing.
pub const NO_SHORT_DESCRIPTION_FALLBACK: &str = "No short description available.";
/// Substituted when the long summary returns nothing.
pub const NO_CONCLUSION_FALLBACK: &str = "No conclusion available.";

/// Prefix of the uniform error text in a failed [`AnalysisReport`].
pub const PROCESSING_ERROR_PREFIX: &str = "An unexpected error occurred during processing: ";

/// Result of a successful analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Image to display next to the results, if any.
    pub preview_path: Option<String>,
    pub short_description: String,
    /// Structured interpretation of the chart.
    pub key_insights: String,
    /// Multi-sentence summary.
    pub conclusion: String,
    /// Raw OCR text, or [`NO_TEXT_FALLBACK`].
    pub extracted_text: String,
    /// Quality report of the raw OCR text.
    pub validation: Option<ValidationReport>,
    /// Stages whose output was replaced by a fallback string.
    pub fallbacks: Vec<String>,
    pub stats: AnalysisStats,
}

/// Timing and size information for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub input_bytes: usize,
    pub ocr_pages: usize,
    pub ocr_lines: usize,
    pub ocr_words: usize,
    pub ocr_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What the presentation layer receives: always five fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub preview_path: Option<String>,
    pub short_description: String,
    pub key_insights: String,
    pub conclusion: String,
    pub extracted_text: String,
    /// The error behind a failed run; `None` on success.
    pub error: Option<String>,
}

impl AnalysisReport {
    /// A report whose four text fields all carry the same error message.
    pub fn failed(preview_path: Option<String>, error: &str) -> Self {
        let message = format!("{PROCESSING_ERROR_PREFIX}{error}");
        Self {
            preview_path,
            short_description: message.clone(),
            key_insights: message.clone(),
            conclusion: message.clone(),
            extracted_text: message,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `(preview_path, short_description, key_insights, conclusion, extracted_text)`
    pub fn into_tuple(self) -> (Option<String>, String, String, String, String) {
        (
            self.preview_path,
            self.short_description,
            self.key_insights,
            self.conclusion,
            self.extracted_text,
        )
    }
}

impl From<AnalysisOutput> for AnalysisReport {
    fn from(out: AnalysisOutput) -> Self {
        Self {
            preview_path: out.preview_path,
            short_description: out.short_description,
            key_insights: out.key_insights,
            conclusion: out.conclusion,
            extracted_text: out.extracted_text,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_report_is_uniform() {
        let report = AnalysisReport::failed(Some("chart.png".into()), "boom");
        assert!(!report.is_success());
        let (preview, short, insights, conclusion, text) = report.into_tuple();
        assert_eq!(preview.as_deref(), Some("chart.png"));
        assert_eq!(short, "An unexpected error occurred during processing: boom");
        assert_eq!(short, insights);
        assert_eq!(short, conclusion);
        assert_eq!(short, text);
    }

    #[test]
    fn tuple_order_matches_fields() {
        let out = AnalysisOutput {
            preview_path: None,
            short_description: "short".into(),
            key_insights: "insights".into(),
            conclusion: "conclusion".into(),
            extracted_text: "text".into(),
            validation: None,
            fallbacks: vec![],
            stats: AnalysisStats::default(),
        };
        let tuple = AnalysisReport::from(out).into_tuple();
        assert_eq!(
            tuple,
            (
                None,
                "short".to_string(),
                "insights".to_string(),
                "conclusion".to_string(),
                "text".to_string()
            )
        );
    }
}
