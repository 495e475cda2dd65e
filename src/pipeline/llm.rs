//! LLM interaction: the interpretation and the two summary stages.
//!
//! Each stage is a single prompt-in/text-out exchange with no shared session
//! state. All prompt wording lives in [`crate::prompts`]; this module owns
//! the retry loop and the provider seam.
//!
//! ## Retry Strategy
//!
//! Transient provider errors (429/503, dropped connections) are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`): with 500 ms base and
//! 2 retries the wait sequence is 500 ms → 1 s.

use crate::config::{backoff_ms, AnalysisConfig, StageSettings};
use crate::prompts;
use crate::progress::Stage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Minimum trimmed length of an interpretation worth summarising at length.
pub const MIN_SUMMARY_INPUT_CHARS: usize = 10;

/// Returned by the long summary instead of calling the model on tiny input.
pub const INTERPRETATION_TOO_SHORT: &str =
    "The received interpretation is too short to summarize.";

/// A chat model reduced to what the stages need: system + user in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        settings: &StageSettings,
    ) -> Result<String, String>;
}

/// [`LanguageModel`] backed by an edgequake-llm provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        settings: &StageSettings,
    ) -> Result<String, String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let options = build_options(settings);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| e.to_string())?;
        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from a stage's settings.
fn build_options(settings: &StageSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

/// Describe the chart behind `ocr_text`.
pub async fn interpret(
    model: &dyn LanguageModel,
    ocr_text: &str,
    config: &AnalysisConfig,
) -> Result<String, String> {
    run_stage(
        model,
        Stage::Interpretation,
        prompts::INTERPRET_SYSTEM_PROMPT,
        &prompts::interpret_prompt(ocr_text),
        &config.interpret,
        config,
    )
    .await
}

/// One-sentence summary of an interpretation.
pub async fn summarize_short(
    model: &dyn LanguageModel,
    interpretation: &str,
    config: &AnalysisConfig,
) -> Result<String, String> {
    run_stage(
        model,
        Stage::ShortSummary,
        prompts::SUMMARY_SYSTEM_PROMPT,
        &prompts::short_summary_prompt(interpretation),
        &config.short_summary,
        config,
    )
    .await
}

/// Four to six sentence business summary of an interpretation.
///
/// Interpretations shorter than [`MIN_SUMMARY_INPUT_CHARS`] are not sent;
/// [`INTERPRETATION_TOO_SHORT`] is returned instead.
pub async fn summarize_long(
    model: &dyn LanguageModel,
    interpretation: &str,
    config: &AnalysisConfig,
) -> Result<String, String> {
    if interpretation.trim().chars().count() < MIN_SUMMARY_INPUT_CHARS {
        warn!("Interpretation too short for a long summary; skipping model call");
        return Ok(INTERPRETATION_TOO_SHORT.to_string());
    }
    run_stage(
        model,
        Stage::LongSummary,
        prompts::SUMMARY_SYSTEM_PROMPT,
        &prompts::long_summary_prompt(interpretation),
        &config.long_summary,
        config,
    )
    .await
}

/// Call the model with retries; the returned text is trimmed.
async fn run_stage(
    model: &dyn LanguageModel,
    stage: Stage,
    system: &str,
    prompt: &str,
    settings: &StageSettings,
    config: &AnalysisConfig,
) -> Result<String, String> {
    let start = Instant::now();
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                stage, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match model.complete(system, prompt, settings).await {
            Ok(text) => {
                debug!("{}: completed in {:?}", stage, start.elapsed());
                return Ok(text.trim().to_string());
            }
            Err(e) => {
                warn!("{}: attempt {} failed — {}", stage, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
}
