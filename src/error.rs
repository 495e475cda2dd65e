//! Error types for the chartread library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ChartReadError`] — **Fatal**: the analysis cannot proceed at all
//!   (missing file, unsupported format, LLM provider not configured, a
//!   summary stage blew up). Returned as `Err(ChartReadError)` from
//!   [`crate::analyze::try_analyze`].
//!
//! * [`OcrError`] — **Recoverable**: the Read API refused the document,
//!   throttled us, or the operation never finished. The orchestrator logs
//!   these and continues with the documented fallback text, so a flaky OCR
//!   backend never hides the rest of the report.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the Read API adapter and poller.
///
/// Expected network conditions are values of this type, never panics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OcrError {
    /// Transport-level failure (DNS, connect, TLS, timeout) or a 5xx reply.
    #[error("OCR service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// The service rejected the request (HTTP 4xx other than 401/403/429).
    #[error("OCR request rejected (HTTP {status}): {detail}\nCheck the file format and size.")]
    InvalidRequest { status: u16, detail: String },

    /// HTTP 429 — the caller should back off before submitting again.
    #[error("OCR service rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 401/403 — wrong key or endpoint; retrying will not help.
    #[error("OCR service rejected the credentials (HTTP {status}): {detail}")]
    AuthFailed { status: u16, detail: String },

    /// The submission succeeded but carried no `Operation-Location` header.
    #[error("OCR service returned no operation id")]
    NoOperationId,

    /// The recognition operation reached the `failed` terminal status.
    #[error("OCR operation '{operation_id}' failed")]
    OperationFailed { operation_id: String },

    /// The operation did not reach a terminal status within the poll budget.
    #[error("OCR operation '{operation_id}' timed out after {attempts} status checks")]
    Timeout { operation_id: String, attempts: u32 },

    /// A response body could not be decoded.
    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),
}

/// All fatal errors returned by the chartread library.
#[derive(Debug, Error)]
pub enum ChartReadError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is not a PNG, JPEG or PDF.
    #[error("Unsupported file type '{extension}' for '{source_name}'\nSupported formats: PNG, JPG, JPEG, PDF.")]
    UnsupportedFormat {
        source_name: String,
        extension: String,
    },

    /// The input is unusable for a reason other than its format.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Service errors ────────────────────────────────────────────────────
    /// OCR failure surfaced to a caller that asked for it explicitly
    /// (e.g. `--ocr-only`), rather than replaced by fallback text.
    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// An interpretation or summary stage failed after all retries.
    #[error("{stage} stage failed: {detail}")]
    StageFailed { stage: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
