//! # chartread
//!
//! Read charts with OCR, then let an LLM explain them.
//!
//! ## Why this crate?
//!
//! A chart image carries its meaning in a handful of labels and numbers. A
//! cloud OCR service recovers those reliably; a language model is good at
//! turning the recovered, often noisy text back into "what does this chart
//! say". This crate wires the two together with explicit fallbacks so a
//! caller always gets a complete, five-field answer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PNG / JPEG / PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. OCR        submit to the Read API, poll, assemble pages/lines/words
//!  ├─ 3. Validate   whitespace / non-ASCII / punctuation-noise checks
//!  ├─ 4. Interpret  LLM: title, type, variables, trends, extremes …
//!  ├─ 5. Summarise  LLM: one-sentence description + 4–6 sentence conclusion
//!  └─ 6. Output     (preview, short description, insights, conclusion, text)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chartread::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // OCR from VISION_ENDPOINT / VISION_KEY, LLM auto-detected from the environment
//!     let config = AnalysisConfig::default();
//!     let report = analyze("sales.png", &config).await;
//!     println!("{}", report.short_description);
//!     println!("{}", report.conclusion);
//! }
//! ```
//!
//! ## OCR only
//!
//! The [`ocr`] module is usable on its own: [`ocr::extract`] runs one
//! document through submit → poll → assemble, and [`ocr::session::OcrSession`]
//! collects several for comparison and JSON/text export.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `chartread` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! chartread = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_bytes, analyze_sync, extract_text, try_analyze, try_analyze_bytes,
};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, OcrConfig, PollSchedule, RateLimitPolicy,
    StageSettings,
};
pub use error::{ChartReadError, OcrError};
pub use ocr::assemble::AssembledDocument;
pub use ocr::validate::{ValidationIssue, ValidationReport};
pub use ocr::ReadService;
pub use output::{AnalysisOutput, AnalysisReport, AnalysisStats};
pub use pipeline::llm::{LanguageModel, ProviderModel};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
