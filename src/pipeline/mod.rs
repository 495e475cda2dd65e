//! Pipeline stages around the OCR core.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ llm::interpret ──▶ llm::summarize_short
//! (path/URL) (Read API)   (chart fields)  └─▶ llm::summarize_long
//! ```
//!
//! 1. [`input`] — validate the user-supplied path or URL and load its bytes;
//!    unsupported formats are rejected before any network call
//! 2. [`llm`]   — the three prompt-in/text-out stages with retry/backoff
//!
//! The OCR step itself lives in [`crate::ocr`].

pub mod input;
pub mod llm;
