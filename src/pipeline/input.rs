//! Input resolution: normalise a user-supplied path or URL to chart bytes.
//!
//! ## Why check the format up front?
//!
//! The Read API accepts many formats and happily bills for an operation
//! that later fails. Checking the extension (or, for extension-less URLs,
//! the magic bytes) here means an unsupported upload never reaches the
//! network and the caller gets a precise [`ChartReadError`] instead of a
//! generic `failed` status.

use crate::error::ChartReadError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions accepted for analysis.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

/// The three upload formats the pipeline handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Png,
    Jpeg,
    Pdf,
}

impl InputKind {
    /// Map a file extension (without dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(InputKind::Png),
            "jpg" | "jpeg" => Some(InputKind::Jpeg),
            "pdf" => Some(InputKind::Pdf),
            _ => None,
        }
    }

    /// Recognise a kind from the leading bytes of the content.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(InputKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(InputKind::Jpeg)
        } else if bytes.starts_with(b"%PDF") {
            Some(InputKind::Pdf)
        } else {
            None
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, InputKind::Png | InputKind::Jpeg)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputKind::Png => "PNG",
            InputKind::Jpeg => "JPEG",
            InputKind::Pdf => "PDF",
        })
    }
}

/// A validated upload, ready for OCR.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// The path or URL as given by the caller.
    pub source: String,
    pub kind: InputKind,
    pub content: Vec<u8>,
    /// Set for local files; `None` for downloads and in-memory uploads.
    pub local_path: Option<PathBuf>,
}

impl ResolvedInput {
    /// Path to show as the chart preview.
    ///
    /// Images are their own preview. PDFs use `pdf_icon` when that file
    /// exists; otherwise there is no preview. Downloaded images preview by URL.
    pub fn preview_path(&self, pdf_icon: &Path) -> Option<String> {
        if self.kind.is_image() {
            return Some(
                self.local_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.source.clone()),
            );
        }
        if pdf_icon.is_file() {
            Some(pdf_icon.display().to_string())
        } else {
            warn!("PDF preview icon not found: {}", pdf_icon.display());
            None
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to validated chart bytes.
///
/// If the input is a URL it is downloaded; otherwise it must be a readable,
/// non-empty local PNG, JPEG or PDF file.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, ChartReadError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Validate an in-memory upload named `name`.
pub fn resolve_bytes(name: &str, content: Vec<u8>) -> Result<ResolvedInput, ChartReadError> {
    let kind = kind_for(name, &content)?;
    ensure_not_empty(name, &content)?;
    Ok(ResolvedInput {
        source: name.to_string(),
        kind,
        content,
        local_path: None,
    })
}

async fn resolve_local(path_str: &str) -> Result<ResolvedInput, ChartReadError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(ChartReadError::FileNotFound { path });
    }

    // Reject by extension before reading anything.
    let kind = match extension_of(path_str) {
        Some(ext) => InputKind::from_extension(&ext).ok_or_else(|| unsupported(path_str, &ext))?,
        None => return Err(unsupported(path_str, "")),
    };

    let content = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ChartReadError::PermissionDenied { path });
        }
        Err(_) => return Err(ChartReadError::FileNotFound { path }),
    };
    ensure_not_empty(path_str, &content)?;

    debug!("Resolved local {}: {} ({} bytes)", kind, path.display(), content.len());
    Ok(ResolvedInput {
        source: path_str.to_string(),
        kind,
        content,
        local_path: Some(path),
    })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ChartReadError> {
    // Refuse a known-bad extension before any request goes out.
    let ext = extension_of(&url_path(url));
    if let Some(ref ext) = ext {
        if InputKind::from_extension(ext).is_none() {
            return Err(unsupported(url, ext));
        }
    }

    info!("Downloading chart from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ChartReadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ChartReadError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ChartReadError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ChartReadError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content = response
        .bytes()
        .await
        .map_err(|e| ChartReadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let kind = match ext {
        Some(ref ext) => InputKind::from_extension(ext).ok_or_else(|| unsupported(url, ext))?,
        None => InputKind::sniff(&content).ok_or_else(|| unsupported(url, "unknown"))?,
    };
    ensure_not_empty(url, &content)?;

    info!("Downloaded {} ({} bytes)", kind, content.len());
    Ok(ResolvedInput {
        source: url.to_string(),
        kind,
        content,
        local_path: None,
    })
}

/// Extension first, then magic bytes when the name has none.
fn kind_for(name: &str, content: &[u8]) -> Result<InputKind, ChartReadError> {
    match extension_of(name) {
        Some(ext) => InputKind::from_extension(&ext).ok_or_else(|| unsupported(name, &ext)),
        None => InputKind::sniff(content).ok_or_else(|| unsupported(name, "unknown")),
    }
}

fn ensure_not_empty(name: &str, content: &[u8]) -> Result<(), ChartReadError> {
    if content.is_empty() {
        return Err(ChartReadError::InvalidInput {
            input: name.to_string(),
            reason: "file is empty".into(),
        });
    }
    Ok(())
}

fn unsupported(name: &str, ext: &str) -> ChartReadError {
    ChartReadError::UnsupportedFormat {
        source_name: name.to_string(),
        extension: ext.to_string(),
    }
}

/// Lower-cased extension of the last path segment, if any.
fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// The path part of a URL, without query or fragment.
fn url_path(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/chart.png"));
        assert!(is_url("http://example.com/chart.pdf"));
        assert!(!is_url("/tmp/chart.png"));
        assert!(!is_url("chart.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(InputKind::from_extension("PNG"), Some(InputKind::Png));
        assert_eq!(InputKind::from_extension("Jpeg"), Some(InputKind::Jpeg));
        assert_eq!(InputKind::from_extension("jpg"), Some(InputKind::Jpeg));
        assert_eq!(InputKind::from_extension("pdf"), Some(InputKind::Pdf));
        assert_eq!(InputKind::from_extension("gif"), None);
    }

    #[test]
    fn sniff_magic_bytes() {
        assert_eq!(InputKind::sniff(b"\x89PNG\r\n\x1a\nrest"), Some(InputKind::Png));
        assert_eq!(InputKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(InputKind::Jpeg));
        assert_eq!(InputKind::sniff(b"%PDF-1.7"), Some(InputKind::Pdf));
        assert_eq!(InputKind::sniff(b"GIF89a"), None);
    }

    #[test]
    fn url_path_strips_host_and_query() {
        assert_eq!(url_path("https://example.com/a/chart.png?x=1"), "/a/chart.png");
        assert_eq!(url_path("https://example.com/download"), "/download");
        assert_eq!(
            extension_of(&url_path("https://example.com/a/chart.PDF#p2")).as_deref(),
            Some("pdf")
        );
        assert_eq!(extension_of(&url_path("https://example.com/download")), None);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, ChartReadError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let mut f = tempfile::Builder::new().suffix(".gif").tempfile().unwrap();
        f.write_all(b"GIF89a").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap_err();
        match err {
            ChartReadError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "gif"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_file_is_invalid() {
        let f = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, ChartReadError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_image_is_its_own_preview() {
        let mut f = tempfile::Builder::new().suffix(".PNG").tempfile().unwrap();
        f.write_all(b"\x89PNG\r\n\x1a\n....").unwrap();
        let path = f.path().to_str().unwrap().to_string();

        let resolved = resolve_input(&path, 5).await.unwrap();
        assert_eq!(resolved.kind, InputKind::Png);
        assert_eq!(resolved.content.len(), 12);
        assert_eq!(resolved.preview_path(Path::new("unused.png")), Some(path));
    }

    #[test]
    fn pdf_preview_uses_icon_only_when_present() {
        let resolved = resolve_bytes("report.pdf", b"%PDF-1.7".to_vec()).unwrap();
        assert_eq!(resolved.preview_path(Path::new("/no/such/icon.png")), None);

        let icon = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        assert_eq!(
            resolved.preview_path(icon.path()),
            Some(icon.path().display().to_string())
        );
    }

    #[test]
    fn bytes_without_extension_are_sniffed() {
        let resolved = resolve_bytes("upload", vec![0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        assert_eq!(resolved.kind, InputKind::Jpeg);
        assert!(resolve_bytes("upload", b"plain text".to_vec()).is_err());
    }

    #[tokio::test]
    async fn bad_url_extension_fails_before_download() {
        // Unroutable host: reaching the network would be a DownloadFailed.
        let err = resolve_input("http://127.0.0.1:9/chart.bmp", 1).await.unwrap_err();
        assert!(matches!(err, ChartReadError::UnsupportedFormat { .. }));
    }
}
