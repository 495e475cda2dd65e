//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to observe the
//! pipeline as it runs: which stage is active, every poll of the Read
//! operation, and stage outcomes. The library itself never writes to the
//! terminal; presentation is entirely the callback's business.
//!
//! # Example
//!
//! ```rust
//! use chartread::{AnalysisConfig, AnalysisProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for PollCounter {
//!     fn on_poll(&self, attempt: u32, max_attempts: u32, status: &str) {
//!         self.polls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("poll {attempt}/{max_attempts}: {status}");
//!     }
//! }
//!
//! let counter = Arc::new(PollCounter { polls: AtomicUsize::new(0) });
//! let config = AnalysisConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    Interpretation,
    ShortSummary,
    LongSummary,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Ocr,
        Stage::Interpretation,
        Stage::ShortSummary,
        Stage::LongSummary,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Ocr => "OCR",
            Stage::Interpretation => "interpretation",
            Stage::ShortSummary => "short summary",
            Stage::LongSummary => "long summary",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as it works through a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; several
/// documents may be extracted concurrently with
/// [`crate::ocr::extract_many`].
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once per analysis, before input resolution. Always followed
    /// by exactly one [`on_analysis_complete`](Self::on_analysis_complete).
    fn on_analysis_start(&self, source: &str) {
        let _ = source;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after each status query of the recognition operation.
    ///
    /// # Arguments
    /// * `attempt`      — 1-based query number
    /// * `max_attempts` — poll budget
    /// * `status`       — status string reported by the service
    fn on_poll(&self, attempt: u32, max_attempts: u32, status: &str) {
        let _ = (attempt, max_attempts, status);
    }

    /// Called when a stage produced output.
    ///
    /// `used_fallback` is true when the stage's result was empty (or, for
    /// OCR, failed) and the documented fallback text was substituted.
    fn on_stage_complete(&self, stage: Stage, output_len: usize, used_fallback: bool) {
        let _ = (stage, output_len, used_fallback);
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once at the end; `success` is false when the report carries
    /// the uniform error text.
    fn on_analysis_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        polls: AtomicUsize,
        fallbacks: AtomicUsize,
    }

    impl AnalysisProgressCallback for TrackingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_poll(&self, _attempt: u32, _max_attempts: u32, _status: &str) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage, _output_len: usize, used_fallback: bool) {
            if used_fallback {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_analysis_start("chart.png");
        cb.on_stage_start(Stage::Ocr);
        cb.on_poll(1, 30, "running");
        cb.on_stage_complete(Stage::Ocr, 10, false);
        cb.on_stage_error(Stage::Interpretation, "boom");
        cb.on_analysis_complete(false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        for stage in Stage::ALL {
            tracker.on_stage_start(stage);
        }
        tracker.on_poll(1, 30, "running");
        tracker.on_poll(2, 30, "succeeded");
        tracker.on_stage_complete(Stage::Ocr, 0, true);
        tracker.on_stage_complete(Stage::Interpretation, 120, false);

        assert_eq!(*tracker.stages.lock().unwrap(), Stage::ALL.to_vec());
        assert_eq!(tracker.polls.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Ocr.to_string(), "OCR");
        assert_eq!(Stage::LongSummary.to_string(), "long summary");
    }
}
