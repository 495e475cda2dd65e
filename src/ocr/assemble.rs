//! Result assembly: turn a terminal Read payload into an [`AssembledDocument`].
//!
//! The assembler is a pure function of its inputs (plus the wall clock for
//! the timestamp). It never fails: a payload with nothing to read becomes an
//! empty document, and every attribute the service omitted is replaced by a
//! neutral default.

use super::model::{ReadLine, ReadOperationResult, ReadPage, ReadWord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language label used when the caller gave no hint.
pub const AUTO_DETECTED: &str = "auto-detected";

/// A single vertex of a bounding polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Recognised word with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// In `[0.0, 1.0]`, rounded to 3 decimals; 1.0 when the service omits it.
    pub confidence: f64,
    pub bounding_box: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub bounding_box: Vec<Point>,
    /// Empty when the service returned no word-level detail for the line.
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based, strictly increasing in document order.
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
    pub unit: String,
    pub angle: f64,
    pub lines: Vec<Line>,
}

/// Aggregate counts over the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatistics {
    pub total_pages: usize,
    pub total_lines: usize,
    pub total_words: usize,
    pub total_characters: usize,
    pub avg_words_per_line: f64,
}

/// Structured OCR output for one source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub description: String,
    pub language: String,
    pub processing_time_ms: f64,
    pub pages: Vec<Page>,
    pub full_text: String,
    pub statistics: DocumentStatistics,
}

impl AssembledDocument {
    /// `true` when recognition produced no text at all.
    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// Build an [`AssembledDocument`] from a terminal Read payload.
///
/// `full_text` is the newline join of every line, pages in order and lines
/// in order within each page. Word statistics only count lines that carry
/// word-level detail.
pub fn assemble(
    result: &ReadOperationResult,
    source: &str,
    description: &str,
    language: Option<&str>,
    elapsed_ms: f64,
) -> AssembledDocument {
    let read_pages: &[ReadPage] = result
        .analyze_result
        .as_ref()
        .map(|a| a.read_results.as_slice())
        .unwrap_or_default();

    let mut all_text: Vec<&str> = Vec::new();
    let mut total_words = 0usize;

    let pages: Vec<Page> = read_pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let lines: Vec<Line> = page
                .lines
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|line| {
                    all_text.push(&line.text);
                    let converted = convert_line(line);
                    total_words += converted.words.len();
                    converted
                })
                .collect();

            Page {
                page_number: idx as u32 + 1,
                width: page.width.unwrap_or(0.0),
                height: page.height.unwrap_or(0.0),
                unit: page.unit.clone().unwrap_or_else(|| "pixel".to_string()),
                angle: page.angle.unwrap_or(0.0),
                lines,
            }
        })
        .collect();

    let full_text = all_text.join("\n");
    let total_lines = all_text.len();
    let statistics = DocumentStatistics {
        total_pages: pages.len(),
        total_lines,
        total_words,
        total_characters: full_text.chars().count(),
        avg_words_per_line: if total_lines > 0 {
            round_to(total_words as f64 / total_lines as f64, 2)
        } else {
            0.0
        },
    };

    AssembledDocument {
        timestamp: Utc::now(),
        source: source.to_string(),
        description: description.to_string(),
        language: language.unwrap_or(AUTO_DETECTED).to_string(),
        processing_time_ms: round_to(elapsed_ms, 2),
        pages,
        full_text,
        statistics,
    }
}

fn convert_line(line: &ReadLine) -> Line {
    Line {
        text: line.text.clone(),
        bounding_box: to_polygon(line.bounding_box.as_deref()),
        words: line
            .words
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(convert_word)
            .collect(),
    }
}

fn convert_word(word: &ReadWord) -> Word {
    Word {
        text: word.text.clone(),
        confidence: round_to(word.confidence.unwrap_or(1.0), 3),
        bounding_box: to_polygon(word.bounding_box.as_deref()),
    }
}

/// Pair up a flat `[x1, y1, x2, y2, …]` box; an odd trailing value is dropped.
fn to_polygon(flat: Option<&[f64]>) -> Vec<Point> {
    flat.unwrap_or_default()
        .chunks_exact(2)
        .map(|xy| Point { x: xy[0], y: xy[1] })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
