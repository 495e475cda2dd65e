//! Wire types of the Read API v3.2 `analyzeResults` payload.
//!
//! Every field the assembler might default is an `Option` so a sparse
//! response still decodes; defaults are applied in [`super::assemble`], not
//! here, keeping this module a faithful mirror of the JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a running recognition operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the handle from an `Operation-Location` URL.
    ///
    /// The handle is the trailing path segment; a query string is ignored.
    /// Returns `None` when no non-empty segment exists.
    pub fn from_operation_location(location: &str) -> Option<Self> {
        let path = location.split(['?', '#']).next().unwrap_or("");
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.contains(':'))
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary document plus optional language hint, consumed by submission.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub content: Vec<u8>,
    pub language: Option<String>,
}

impl RecognitionRequest {
    pub fn new(content: Vec<u8>, language: Option<String>) -> Self {
        Self { content, language }
    }
}

/// Status of a recognition operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    /// Any status string this crate does not know; polled like `running`.
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Succeeded | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationStatus::NotStarted => "notStarted",
            OperationStatus::Running => "running",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed => "failed",
            OperationStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Body of `GET /vision/v3.2/read/analyzeResults/{operationId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOperationResult {
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze_result: Option<AnalyzeResult>,
}

impl ReadOperationResult {
    /// A bare status payload, as returned while the job is still running.
    pub fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            created_date_time: None,
            last_updated_date_time: None,
            analyze_result: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default)]
    pub read_results: Vec<ReadPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPage {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub lines: Option<Vec<ReadLine>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadLine {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bounding_box: Option<Vec<f64>>,
    #[serde(default)]
    pub words: Option<Vec<ReadWord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadWord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bounding_box: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_from_operation_location() {
        let h = OperationHandle::from_operation_location(
            "https://westeurope.api.cognitive.microsoft.com/vision/v3.2/read/analyzeResults/3f1e-77aa",
        )
        .unwrap();
        assert_eq!(h.as_str(), "3f1e-77aa");
    }

    #[test]
    fn handle_ignores_query_and_trailing_slash() {
        let h = OperationHandle::from_operation_location(
            "https://host/vision/v3.2/read/analyzeResults/op-9/?api-version=2023",
        )
        .unwrap();
        assert_eq!(h.as_str(), "op-9");
    }

    #[test]
    fn handle_missing_segment() {
        assert!(OperationHandle::from_operation_location("").is_none());
        assert!(OperationHandle::from_operation_location("https://").is_none());
    }

    #[test]
    fn decode_running_status() {
        let r: ReadOperationResult =
            serde_json::from_str(r#"{"status":"running","createdDateTime":"2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(r.status, OperationStatus::Running);
        assert!(r.analyze_result.is_none());
    }

    #[test]
    fn decode_unknown_status() {
        let r: ReadOperationResult = serde_json::from_str(r#"{"status":"paused"}"#).unwrap();
        assert_eq!(r.status, OperationStatus::Unknown);
        assert!(!r.status.is_terminal());
    }

    #[test]
    fn decode_succeeded_payload() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "version": "3.2.0",
                "readResults": [{
                    "page": 1, "angle": 0.5, "width": 800, "height": 600, "unit": "pixel",
                    "lines": [{
                        "boundingBox": [1, 2, 3, 4, 5, 6, 7, 8],
                        "text": "Q1 100",
                        "words": [
                            {"boundingBox": [1, 2, 3, 4, 5, 6, 7, 8], "text": "Q1", "confidence": 0.998},
                            {"text": "100"}
                        ]
                    }]
                }]
            }
        }"#;
        let r: ReadOperationResult = serde_json::from_str(json).unwrap();
        let pages = &r.analyze_result.as_ref().unwrap().read_results;
        assert_eq!(pages.len(), 1);
        let line = &pages[0].lines.as_ref().unwrap()[0];
        assert_eq!(line.text, "Q1 100");
        let words = line.words.as_ref().unwrap();
        assert_eq!(words[1].confidence, None);
        assert_eq!(words[1].bounding_box, None);
    }
}
