//! Configuration types for chart analysis.
//!
//! Two layers:
//!
//! * [`OcrConfig`] — where the Read API lives, how to authenticate, and how
//!   patiently to poll it. Constructed explicitly (or from the environment via
//!   [`OcrConfig::from_env`]) and handed to the client at creation time; there
//!   is no process-wide configuration singleton.
//! * [`AnalysisConfig`] — everything the orchestrator needs: the OCR layer,
//!   the LLM provider selection, per-stage sampling settings and retry policy.
//!   Built via [`AnalysisConfigBuilder`].

use crate::error::ChartReadError;
use crate::ocr::ReadService;
use crate::pipeline::llm::LanguageModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default location of the icon shown as the preview for PDF inputs.
pub const DEFAULT_PDF_ICON: &str = "assets/pdf_icon.png";

// ── OCR layer ────────────────────────────────────────────────────────────

/// How often and how long to poll a recognition operation.
///
/// The default is a fixed 1 s cadence for at most 30 status checks. Read jobs
/// for a single chart finish in a few seconds, so the fixed cadence is a known
/// simplification; set `backoff_factor > 1.0` to stretch the interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSchedule {
    /// Maximum number of status queries. Default: 30.
    pub max_attempts: u32,
    /// Wait after the first non-terminal status. Default: 1 s.
    pub interval: Duration,
    /// Multiplier applied to the interval after each wait. Default: 1.0 (fixed).
    pub backoff_factor: f64,
    /// Upper bound on a single wait when backing off. Default: 10 s.
    pub max_interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

impl PollSchedule {
    /// Fixed cadence with the given budget.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            ..Self::default()
        }
    }

    /// Wait to apply after the `attempt`-th (1-based) non-terminal status.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff_factor <= 1.0 {
            return self.interval;
        }
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.interval.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_interval.as_secs_f64()))
    }
}

/// What to do when the Read API answers a submission with HTTP 429.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitPolicy {
    /// Log a backoff recommendation and surface `RateLimited` (default).
    #[default]
    Report,
    /// Re-submit up to `max_retries` times, doubling the wait each time.
    /// A `Retry-After` header, when present, overrides the computed wait.
    /// Either way a single wait never exceeds `max_backoff_ms`.
    Retry {
        max_retries: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    },
}

/// Default ceiling on a single rate-limit wait: 60 s.
pub const DEFAULT_MAX_RATE_LIMIT_BACKOFF_MS: u64 = 60_000;

impl RateLimitPolicy {
    /// Retry with the default 60 s ceiling.
    pub fn retry(max_retries: u32, initial_backoff_ms: u64) -> Self {
        RateLimitPolicy::Retry {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: DEFAULT_MAX_RATE_LIMIT_BACKOFF_MS,
        }
    }

    /// Wait before the `attempt`-th (1-based) resubmission.
    ///
    /// `Report` never waits.
    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let RateLimitPolicy::Retry {
            initial_backoff_ms,
            max_backoff_ms,
            ..
        } = *self
        else {
            return Duration::ZERO;
        };
        let ms = match retry_after_secs {
            Some(secs) => secs.saturating_mul(1000),
            None => backoff_ms(initial_backoff_ms, attempt),
        };
        Duration::from_millis(ms.min(max_backoff_ms))
    }
}

/// `base * 2^(attempt - 1)`, saturating at `u64::MAX`.
pub(crate) fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    base.saturating_mul(factor)
}

/// Connection and polling settings for the Read API.
#[derive(Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Resource endpoint, e.g. `https://my-vision.cognitiveservices.azure.com/`.
    pub endpoint: String,
    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    pub key: String,
    pub poll: PollSchedule,
    pub rate_limit: RateLimitPolicy,
    /// Per-request HTTP timeout. Default: 30 s.
    pub request_timeout: Duration,
    /// Permit `http://` endpoints (local fakes and proxies). Default: false.
    pub allow_insecure_endpoint: bool,
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("poll", &self.poll)
            .field("rate_limit", &self.rate_limit)
            .field("request_timeout", &self.request_timeout)
            .field("allow_insecure_endpoint", &self.allow_insecure_endpoint)
            .finish()
    }
}

impl OcrConfig {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            poll: PollSchedule::default(),
            rate_limit: RateLimitPolicy::default(),
            request_timeout: Duration::from_secs(30),
            allow_insecure_endpoint: false,
        }
    }

    /// Read `VISION_ENDPOINT` / `AZURE_VISION_ENDPOINT` and `VISION_KEY` /
    /// `AZURE_VISION_KEY`, then validate.
    pub fn from_env() -> Result<Self, ChartReadError> {
        let endpoint = first_env(&["VISION_ENDPOINT", "AZURE_VISION_ENDPOINT"]);
        let key = first_env(&["VISION_KEY", "AZURE_VISION_KEY"]);
        match (endpoint, key) {
            (Some(endpoint), Some(key)) => {
                let config = Self::new(endpoint, key);
                config.validate()?;
                Ok(config)
            }
            _ => Err(ChartReadError::InvalidConfig(
                "Computer Vision credentials not found. \
                 Set VISION_ENDPOINT and VISION_KEY (or put them in a .env file)."
                    .into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ChartReadError> {
        if self.endpoint.trim().is_empty() || self.key.trim().is_empty() {
            return Err(ChartReadError::InvalidConfig(
                "OCR endpoint and key must both be set".into(),
            ));
        }
        if !self.allow_insecure_endpoint && !self.endpoint.starts_with("https://") {
            return Err(ChartReadError::InvalidConfig(format!(
                "OCR endpoint must start with https://, got '{}'",
                self.endpoint
            )));
        }
        if self.poll.max_attempts == 0 {
            return Err(ChartReadError::InvalidConfig(
                "Poll max_attempts must be ≥ 1".into(),
            ));
        }
        Ok(())
    }

    /// Endpoint without trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

// ── LLM stages ───────────────────────────────────────────────────────────

/// Sampling settings for one LLM stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl StageSettings {
    /// Interpretation: deterministic, room for the nine structured fields.
    pub const INTERPRET: Self = Self {
        temperature: 0.0,
        max_tokens: 400,
    };
    /// One-sentence description.
    pub const SHORT_SUMMARY: Self = Self {
        temperature: 0.2,
        max_tokens: 40,
    };
    /// Four to six sentence conclusion.
    pub const LONG_SUMMARY: Self = Self {
        temperature: 0.3,
        max_tokens: 250,
    };
}

/// Configuration for a full analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use chartread::{AnalysisConfig, OcrConfig};
///
/// let config = AnalysisConfig::builder()
///     .ocr(OcrConfig::new("https://example.cognitiveservices.azure.com/", "key"))
///     .language("en")
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// assert_eq!(config.language.as_deref(), Some("en"));
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Read API settings. When `None` and no `read_service` is injected,
    /// [`OcrConfig::from_env`] is consulted at analysis time.
    pub ocr: Option<OcrConfig>,

    /// Pre-constructed OCR backend. Takes precedence over `ocr`.
    pub read_service: Option<Arc<dyn ReadService>>,

    /// OCR language hint (ISO 639-1). `None` lets the service auto-detect.
    pub language: Option<String>,

    /// Pre-constructed language model. Takes precedence over every other
    /// provider setting.
    pub language_model: Option<Arc<dyn LanguageModel>>,

    /// Pre-constructed edgequake-llm provider.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "azure", "ollama").
    pub provider_name: Option<String>,

    /// LLM model identifier. Default when `None`: "gpt-4o".
    pub model: Option<String>,

    pub interpret: StageSettings,
    pub short_summary: StageSettings,
    pub long_summary: StageSettings,

    /// Retry attempts per LLM stage on failure. Default: 2.
    pub max_retries: u32,

    /// Initial LLM retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Preview image used for PDF inputs. Default: `assets/pdf_icon.png`.
    pub pdf_icon: PathBuf,

    /// Receives stage and poll events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ocr: None,
            read_service: None,
            language: None,
            language_model: None,
            provider: None,
            provider_name: None,
            model: None,
            interpret: StageSettings::INTERPRET,
            short_summary: StageSettings::SHORT_SUMMARY,
            long_summary: StageSettings::LONG_SUMMARY,
            max_retries: 2,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            pdf_icon: PathBuf::from(DEFAULT_PDF_ICON),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("ocr", &self.ocr)
            .field("read_service", &self.read_service.as_ref().map(|_| "<dyn ReadService>"))
            .field("language", &self.language)
            .field("language_model", &self.language_model.as_ref().map(|_| "<dyn LanguageModel>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("interpret", &self.interpret)
            .field("short_summary", &self.short_summary)
            .field("long_summary", &self.long_summary)
            .field("max_retries", &self.max_retries)
            .field("pdf_icon", &self.pdf_icon)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = Some(ocr);
        self
    }

    pub fn read_service(mut self, service: Arc<dyn ReadService>) -> Self {
        self.config.read_service = Some(service);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = Some(language.into());
        self
    }

    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.config.language_model = Some(model);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn interpret(mut self, settings: StageSettings) -> Self {
        self.config.interpret = settings;
        self
    }

    pub fn short_summary(mut self, settings: StageSettings) -> Self {
        self.config.short_summary = settings;
        self
    }

    pub fn long_summary(mut self, settings: StageSettings) -> Self {
        self.config.long_summary = settings;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdf_icon(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf_icon = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ChartReadError> {
        let c = &self.config;
        if let Some(ref ocr) = c.ocr {
            ocr.validate()?;
        }
        for (name, s) in [
            ("interpret", c.interpret),
            ("short_summary", c.short_summary),
            ("long_summary", c.long_summary),
        ] {
            if !(0.0..=2.0).contains(&s.temperature) {
                return Err(ChartReadError::InvalidConfig(format!(
                    "{name} temperature must be 0.0–2.0, got {}",
                    s.temperature
                )));
            }
            if s.max_tokens == 0 {
                return Err(ChartReadError::InvalidConfig(format!(
                    "{name} max_tokens must be ≥ 1"
                )));
            }
        }
        if let Some(ref lang) = c.language {
            if lang.trim().is_empty() {
                return Err(ChartReadError::InvalidConfig(
                    "Language hint must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_schedule_defaults() {
        let s = PollSchedule::default();
        assert_eq!(s.max_attempts, 30);
        assert_eq!(s.interval, Duration::from_secs(1));
        assert_eq!(s.delay_after(1), Duration::from_secs(1));
        assert_eq!(s.delay_after(29), Duration::from_secs(1));
    }

    #[test]
    fn poll_schedule_backoff_is_capped() {
        let s = PollSchedule {
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(5),
            ..PollSchedule::default()
        };
        assert_eq!(s.delay_after(1), Duration::from_secs(1));
        assert_eq!(s.delay_after(2), Duration::from_secs(2));
        assert_eq!(s.delay_after(3), Duration::from_secs(4));
        assert_eq!(s.delay_after(4), Duration::from_secs(5));
        assert_eq!(s.delay_after(100), Duration::from_secs(5));
    }

    #[test]
    fn rate_limit_delay_doubles_up_to_ceiling() {
        let p = RateLimitPolicy::Retry {
            max_retries: 100,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        assert_eq!(p.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(p.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(p.delay_for(4, None), Duration::from_secs(5));
        assert_eq!(p.delay_for(56, None), Duration::from_secs(5));
        assert_eq!(p.delay_for(u32::MAX, None), Duration::from_secs(5));
    }

    #[test]
    fn rate_limit_retry_after_is_capped() {
        let p = RateLimitPolicy::retry(3, 100);
        assert_eq!(p.delay_for(1, Some(2)), Duration::from_secs(2));
        assert_eq!(p.delay_for(1, Some(3600)), Duration::from_secs(60));
        assert_eq!(p.delay_for(1, Some(u64::MAX)), Duration::from_secs(60));
        assert_eq!(RateLimitPolicy::Report.delay_for(1, Some(5)), Duration::ZERO);
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(1000, 56), u64::MAX);
        assert_eq!(backoff_ms(1, 200), u64::MAX);
    }

    #[test]
    fn ocr_config_requires_https() {
        let c = OcrConfig::new("http://localhost:8080", "k");
        assert!(c.validate().is_err());

        let mut c = OcrConfig::new("http://localhost:8080", "k");
        c.allow_insecure_endpoint = true;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn ocr_config_requires_key() {
        let c = OcrConfig::new("https://x.cognitiveservices.azure.com", " ");
        assert!(c.validate().is_err());
    }

    #[test]
    fn base_url_trims_slash() {
        let c = OcrConfig::new("https://x.cognitiveservices.azure.com/", "k");
        assert_eq!(c.base_url(), "https://x.cognitiveservices.azure.com");
    }

    #[test]
    fn debug_redacts_key() {
        let c = OcrConfig::new("https://x", "super-secret");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn builder_defaults() {
        let c = AnalysisConfig::builder().build().unwrap();
        assert_eq!(c.interpret, StageSettings::INTERPRET);
        assert_eq!(c.short_summary.max_tokens, 40);
        assert_eq!(c.long_summary.temperature, 0.3);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.pdf_icon, PathBuf::from(DEFAULT_PDF_ICON));
    }

    #[test]
    fn builder_rejects_bad_temperature() {
        let r = AnalysisConfig::builder()
            .interpret(StageSettings {
                temperature: 3.0,
                max_tokens: 10,
            })
            .build();
        assert!(matches!(r, Err(ChartReadError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_invalid_ocr() {
        let r = AnalysisConfig::builder()
            .ocr(OcrConfig::new("ftp://nope", "k"))
            .build();
        assert!(r.is_err());
    }
}
