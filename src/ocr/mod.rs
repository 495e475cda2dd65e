//! OCR extraction: submit → poll → assemble → validate.
//!
//! ```text
//! RecognitionRequest ──▶ submit ──▶ poll ──▶ assemble ──▶ AssembledDocument
//!   (bytes + lang)      (client)   (poll)   (assemble)        │
//!                                                             └─▶ validate
//! ```
//!
//! 1. [`client`]   — the Read API adapter; the only module doing HTTP
//! 2. [`poll`]     — fixed-cadence status loop with an attempt ceiling
//! 3. [`assemble`] — payload → pages/lines/words + statistics
//! 4. [`validate`] — quality checks on the assembled text
//! 5. [`session`]  — accumulates documents of a run for comparison and export
//!
//! The network side sits behind the [`ReadService`] trait so the poller and
//! the orchestrator run unchanged against a scripted fake.

pub mod assemble;
pub mod client;
pub mod model;
pub mod poll;
pub mod session;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::{OcrConfig, PollSchedule, RateLimitPolicy};
use crate::error::OcrError;
use crate::progress::ProgressCallback;
use assemble::{assemble, AssembledDocument};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use model::{OperationHandle, ReadOperationResult, RecognitionRequest};
use poll::PollOutcome;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The two calls of an asynchronous recognition service.
#[async_trait]
pub trait ReadService: Send + Sync {
    /// Start recognition of `content`; returns the handle to poll.
    async fn submit(
        &self,
        content: &[u8],
        language: Option<&str>,
    ) -> Result<OperationHandle, OcrError>;

    /// Query the current status (and, once succeeded, the payload).
    async fn fetch_result(
        &self,
        handle: &OperationHandle,
    ) -> Result<ReadOperationResult, OcrError>;
}

/// Polling and throttling behaviour for [`extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOptions {
    pub poll: PollSchedule,
    pub rate_limit: RateLimitPolicy,
}

impl From<&OcrConfig> for ExtractOptions {
    fn from(config: &OcrConfig) -> Self {
        Self {
            poll: config.poll.clone(),
            rate_limit: config.rate_limit.clone(),
        }
    }
}

/// Run one document through submit → poll → assemble.
///
/// `Failed` and `TimedOut` poll outcomes become [`OcrError::OperationFailed`]
/// and [`OcrError::Timeout`]; no partial result is returned for either.
pub async fn extract(
    service: &dyn ReadService,
    request: RecognitionRequest,
    source: &str,
    description: &str,
    options: &ExtractOptions,
    progress: Option<&ProgressCallback>,
) -> Result<AssembledDocument, OcrError> {
    info!("Extracting text from: {}", if description.is_empty() { source } else { description });
    let start = Instant::now();
    let language = request.language.as_deref();
    if let Some(lang) = language {
        debug!("Language hint: {}", lang);
    }

    let handle = submit_with_policy(service, &request, &options.rate_limit).await?;
    debug!("Operation ID: {}", handle);

    let result = match poll::poll(service, &handle, &options.poll, progress).await? {
        PollOutcome::Succeeded(result) => result,
        PollOutcome::Failed => {
            return Err(OcrError::OperationFailed {
                operation_id: handle.to_string(),
            })
        }
        PollOutcome::TimedOut { attempts } => {
            return Err(OcrError::Timeout {
                operation_id: handle.to_string(),
                attempts,
            })
        }
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let doc = assemble(&result, source, description, language, elapsed_ms);
    log_summary(&doc);
    Ok(doc)
}

/// A document queued for [`extract_many`].
#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub source: String,
    pub description: String,
    pub request: RecognitionRequest,
}

/// Extract several independent documents, at most `concurrency` at a time.
///
/// Results come back in job order regardless of completion order.
pub async fn extract_many(
    service: &dyn ReadService,
    jobs: Vec<ExtractJob>,
    options: &ExtractOptions,
    concurrency: usize,
) -> Vec<Result<AssembledDocument, OcrError>> {
    let mut results: Vec<(usize, Result<AssembledDocument, OcrError>)> =
        stream::iter(jobs.into_iter().enumerate().map(|(idx, job)| async move {
            let result = extract(
                service,
                job.request,
                &job.source,
                &job.description,
                options,
                None,
            )
            .await;
            (idx, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Submit, applying the configured policy to HTTP 429 replies only.
async fn submit_with_policy(
    service: &dyn ReadService,
    request: &RecognitionRequest,
    policy: &RateLimitPolicy,
) -> Result<OperationHandle, OcrError> {
    let language = request.language.as_deref();
    let max_retries = match policy {
        RateLimitPolicy::Report => 0,
        RateLimitPolicy::Retry { max_retries, .. } => *max_retries,
    };

    let mut attempt = 0u32;
    loop {
        match service.submit(&request.content, language).await {
            Err(OcrError::RateLimited { retry_after_secs }) if attempt < max_retries => {
                attempt += 1;
                let wait = policy.delay_for(attempt, retry_after_secs);
                warn!(
                    "Rate limited; resubmitting ({}/{}) after {:?}",
                    attempt, max_retries, wait
                );
                sleep(wait).await;
            }
            Err(OcrError::RateLimited { retry_after_secs }) => {
                warn!("Rate limit exceeded. Implement exponential backoff before retrying.");
                return Err(OcrError::RateLimited { retry_after_secs });
            }
            other => return other,
        }
    }
}

fn log_summary(doc: &AssembledDocument) {
    let stats = &doc.statistics;
    info!(
        "Extraction completed in {}ms — pages: {} | lines: {} | words: {}",
        doc.processing_time_ms, stats.total_pages, stats.total_lines, stats.total_words
    );
    let preview: String = doc.full_text.chars().take(200).collect();
    if doc.full_text.chars().count() > 200 {
        debug!("Extracted text (first 200 chars): {}...", preview);
    } else {
        debug!("Extracted text: {}", preview);
    }
}
