//! A run-scoped OCR session: extract several documents, compare, export.
//!
//! The session owns its result log; nothing is shared across sessions.

use super::assemble::AssembledDocument;
use super::model::RecognitionRequest;
use super::validate::{validate, ValidationIssue};
use super::{extract, ExtractOptions, ReadService};
use crate::error::{ChartReadError, OcrError};
use crate::progress::ProgressCallback;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Label written into the JSON export envelope.
pub const EXPORT_TASK_LABEL: &str = "OCR Text Extraction";

/// One row of [`OcrSession::compare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub description: String,
    pub processing_time_ms: f64,
    pub language: String,
    pub total_pages: usize,
    pub total_lines: usize,
    pub total_words: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Envelope of the JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub task: String,
    pub timestamp: DateTime<Utc>,
    pub total_documents_processed: usize,
    pub results: Vec<AssembledDocument>,
}

pub struct OcrSession {
    service: Arc<dyn ReadService>,
    options: ExtractOptions,
    progress: Option<ProgressCallback>,
    results: Vec<AssembledDocument>,
}

impl OcrSession {
    pub fn new(service: Arc<dyn ReadService>, options: ExtractOptions) -> Self {
        Self {
            service,
            options,
            progress: None,
            results: Vec::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Extract one document; on success it is appended to the session log.
    pub async fn extract(
        &mut self,
        request: RecognitionRequest,
        source: &str,
        description: &str,
    ) -> Result<AssembledDocument, OcrError> {
        let doc = extract(
            self.service.as_ref(),
            request,
            source,
            description,
            &self.options,
            self.progress.as_ref(),
        )
        .await?;
        self.results.push(doc.clone());
        Ok(doc)
    }

    pub fn results(&self) -> &[AssembledDocument] {
        &self.results
    }

    /// Per-document timing, counts and validation issues.
    pub fn compare(&self) -> Vec<ComparisonEntry> {
        self.results
            .iter()
            .map(|doc| ComparisonEntry {
                description: doc.description.clone(),
                processing_time_ms: doc.processing_time_ms,
                language: doc.language.clone(),
                total_pages: doc.statistics.total_pages,
                total_lines: doc.statistics.total_lines,
                total_words: doc.statistics.total_words,
                issues: validate(&doc.full_text).issues,
            })
            .collect()
    }

    pub fn to_export(&self) -> SessionExport {
        SessionExport {
            task: EXPORT_TASK_LABEL.to_string(),
            timestamp: Utc::now(),
            total_documents_processed: self.results.len(),
            results: self.results.clone(),
        }
    }

    /// Write every document of the session to one pretty-printed JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<PathBuf, ChartReadError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.to_export())
            .map_err(|e| ChartReadError::Internal(format!("serialise results: {e}")))?;
        write_file(path, json.as_bytes()).await?;
        info!("Results saved to: {}", path.display());
        Ok(path.to_path_buf())
    }

    /// Write one `ocr_output_{i}_{description}.txt` per document into `dir`.
    pub async fn export_text_files(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, ChartReadError> {
        let dir = dir.as_ref();
        let mut written = Vec::with_capacity(self.results.len());
        for (i, doc) in self.results.iter().enumerate() {
            let path = dir.join(text_export_name(i + 1, &doc.description));
            write_file(&path, render_text_export(doc).as_bytes()).await?;
            info!("Exported: {}", path.display());
            written.push(path);
        }
        if written.is_empty() {
            warn!("No documents in session; nothing exported");
        }
        Ok(written)
    }
}

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// File name for the `index`-th (1-based) text export.
pub fn text_export_name(index: usize, description: &str) -> String {
    let safe = RE_UNSAFE.replace_all(description, "");
    let safe = RE_SPACES.replace_all(&safe, "_");
    format!("ocr_output_{index}_{safe}.txt")
}

/// Header block followed by the full text.
pub fn render_text_export(doc: &AssembledDocument) -> String {
    format!(
        "OCR Extraction Results\nSource: {}\nLanguage: {}\nTimestamp: {}\n\n{}\n\n{}",
        doc.description,
        doc.language,
        doc.timestamp.to_rfc3339(),
        "=".repeat(70),
        doc.full_text
    )
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ChartReadError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChartReadError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ChartReadError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
