//! Analysis entry points: OCR → interpretation → summaries.
//!
//! ```text
//! input ──▶ resolve ──▶ OCR ──▶ interpret ──▶ short summary
//!                        │          │     └──▶ long summary
//!                        ▼          ▼
//!                  fallback text on empty output
//! ```
//!
//! ## Two tiers of failure
//!
//! OCR problems (throttling, timeouts, a `failed` operation) are absorbed:
//! the run continues with [`NO_TEXT_FALLBACK`] so the model can still say
//! something useful. A failing LLM stage is not absorbed; [`try_analyze`]
//! returns [`ChartReadError::StageFailed`] and [`analyze`] turns any error
//! into a report whose four text fields carry the same message, so a
//! viewer never shows real output next to error text.

use crate::config::{AnalysisConfig, OcrConfig};
use crate::error::ChartReadError;
use crate::ocr::assemble::AssembledDocument;
use crate::ocr::client::ReadClient;
use crate::ocr::model::RecognitionRequest;
use crate::ocr::validate::validate;
use crate::ocr::{self, ExtractOptions, ReadService};
use crate::output::{
    AnalysisOutput, AnalysisReport, AnalysisStats, NO_CONCLUSION_FALLBACK, NO_INSIGHTS_FALLBACK,
    NO_SHORT_DESCRIPTION_FALLBACK, NO_TEXT_FALLBACK,
};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{self, LanguageModel, ProviderModel};
use crate::progress::Stage;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Analyse a chart image or PDF given as a local path or URL.
///
/// # Errors
/// Input problems, a missing OCR or LLM configuration, and failed LLM
/// stages. OCR service failures are not errors here; they yield
/// [`NO_TEXT_FALLBACK`] as the extracted text.
pub async fn try_analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, ChartReadError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);
    announce(input_str, config);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| failed(e, config))?;
    run(resolved, config).await.map_err(|e| failed(e, config))
}

/// Like [`try_analyze`] for an upload already in memory.
///
/// `name` supplies the extension; without one the format is sniffed.
pub async fn try_analyze_bytes(
    name: &str,
    bytes: Vec<u8>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, ChartReadError> {
    info!("Starting analysis: {} ({} bytes)", name, bytes.len());
    announce(name, config);
    let resolved = input::resolve_bytes(name, bytes).map_err(|e| failed(e, config))?;
    run(resolved, config).await.map_err(|e| failed(e, config))
}

/// Analyse a chart and always return the five display fields.
///
/// On any error the four text fields hold the same
/// `"An unexpected error occurred during processing: …"` message; the
/// preview path is kept when the input got far enough to have one.
pub async fn analyze(input_str: impl AsRef<str>, config: &AnalysisConfig) -> AnalysisReport {
    let input_str = input_str.as_ref();
    announce(input_str, config);
    match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(resolved) => report(resolved, config).await,
        Err(e) => AnalysisReport::failed(None, &failed(e, config).to_string()),
    }
}

/// [`analyze`] for an upload already in memory.
pub async fn analyze_bytes(name: &str, bytes: Vec<u8>, config: &AnalysisConfig) -> AnalysisReport {
    announce(name, config);
    match input::resolve_bytes(name, bytes) {
        Ok(resolved) => report(resolved, config).await,
        Err(e) => AnalysisReport::failed(None, &failed(e, config).to_string()),
    }
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(input_str: impl AsRef<str>, config: &AnalysisConfig) -> AnalysisReport {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(analyze(input_str, config)),
        Err(e) => {
            announce(input_str.as_ref(), config);
            let e = ChartReadError::Internal(format!("Failed to create tokio runtime: {}", e));
            AnalysisReport::failed(None, &failed(e, config).to_string())
        }
    }
}

/// OCR only: resolve the input and extract its text, surfacing OCR errors.
///
/// Does not require an LLM provider.
pub async fn extract_text(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AssembledDocument, ChartReadError> {
    let resolved =
        input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let service = resolve_read_service(config)?;
    let doc = ocr::extract(
        service.as_ref(),
        RecognitionRequest::new(resolved.content, config.language.clone()),
        &resolved.source,
        &describe(&resolved.source),
        &extract_options(config),
        config.progress_callback.as_ref(),
    )
    .await?;
    Ok(doc)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn report(resolved: ResolvedInput, config: &AnalysisConfig) -> AnalysisReport {
    let preview = resolved.preview_path(&config.pdf_icon);
    match run(resolved, config).await {
        Ok(out) => out.into(),
        Err(e) => AnalysisReport::failed(preview, &failed(e, config).to_string()),
    }
}

fn announce(source: &str, config: &AnalysisConfig) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(source);
    }
}

/// Log `e` and close the run for the progress callback.
fn failed(e: ChartReadError, config: &AnalysisConfig) -> ChartReadError {
    warn!("Analysis failed: {}", e);
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(false);
    }
    e
}

async fn run(
    resolved: ResolvedInput,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, ChartReadError> {
    let total_start = Instant::now();
    let cb = config.progress_callback.as_ref();
    let preview_path = resolved.preview_path(&config.pdf_icon);
    let input_bytes = resolved.content.len();

    // ── Step 1: Resolve backends ─────────────────────────────────────────
    let model = resolve_language_model(config)?;
    let service = resolve_read_service(config)?;

    // ── Step 2: OCR ──────────────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Ocr);
    }
    let ocr_start = Instant::now();
    let request = RecognitionRequest::new(resolved.content, config.language.clone());
    let doc = match ocr::extract(
        service.as_ref(),
        request,
        &resolved.source,
        &describe(&resolved.source),
        &extract_options(config),
        cb,
    )
    .await
    {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("OCR failed, continuing without text: {}", e);
            if let Some(cb) = cb {
                cb.on_stage_error(Stage::Ocr, &e.to_string());
            }
            None
        }
    };
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    let mut fallbacks = Vec::new();
    let raw_text = doc.as_ref().map(|d| d.full_text.as_str()).unwrap_or_default();
    let has_text = !raw_text.trim().is_empty();
    let validation = has_text.then(|| validate(raw_text));
    if let Some(ref report) = validation {
        for issue in &report.issues {
            debug!("OCR quality: {}", issue.description());
        }
    }
    let extracted_text = if !has_text {
        warn!("No text extracted; using fallback");
        fallbacks.push(Stage::Ocr.label().to_string());
        NO_TEXT_FALLBACK.to_string()
    } else {
        raw_text.to_string()
    };
    if let Some(cb) = cb {
        cb.on_stage_complete(Stage::Ocr, extracted_text.len(), !has_text);
    }

    // ── Step 3: Interpretation ───────────────────────────────────────────
    let llm_start = Instant::now();
    let key_insights = run_stage(
        Stage::Interpretation,
        config,
        NO_INSIGHTS_FALLBACK,
        &mut fallbacks,
        llm::interpret(model.as_ref(), &extracted_text, config),
    )
    .await?;

    // ── Step 4: Summaries ────────────────────────────────────────────────
    let short_description = run_stage(
        Stage::ShortSummary,
        config,
        NO_SHORT_DESCRIPTION_FALLBACK,
        &mut fallbacks,
        llm::summarize_short(model.as_ref(), &key_insights, config),
    )
    .await?;
    let conclusion = run_stage(
        Stage::LongSummary,
        config,
        NO_CONCLUSION_FALLBACK,
        &mut fallbacks,
        llm::summarize_long(model.as_ref(), &key_insights, config),
    )
    .await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let stats = AnalysisStats {
        input_bytes,
        ocr_pages: doc.as_ref().map_or(0, |d| d.statistics.total_pages),
        ocr_lines: doc.as_ref().map_or(0, |d| d.statistics.total_lines),
        ocr_words: doc.as_ref().map_or(0, |d| d.statistics.total_words),
        ocr_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: {} lines OCR'd, {} fallbacks, {}ms total",
        stats.ocr_lines,
        fallbacks.len(),
        stats.total_duration_ms
    );
    if let Some(cb) = cb {
        cb.on_analysis_complete(true);
    }

    Ok(AnalysisOutput {
        preview_path,
        short_description,
        key_insights,
        conclusion,
        extracted_text,
        validation,
        fallbacks,
        stats,
    })
}

/// Await one LLM stage, substituting `fallback` for empty output.
async fn run_stage<Fut>(
    stage: Stage,
    config: &AnalysisConfig,
    fallback: &str,
    fallbacks: &mut Vec<String>,
    call: Fut,
) -> Result<String, ChartReadError>
where
    Fut: Future<Output = Result<String, String>>,
{
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_stage_start(stage);
    }
    info!("Running {} stage", stage);

    match call.await {
        Ok(text) if !text.trim().is_empty() => {
            if let Some(cb) = cb {
                cb.on_stage_complete(stage, text.len(), false);
            }
            Ok(text)
        }
        Ok(_) => {
            warn!("{} returned no text; using fallback", stage);
            fallbacks.push(stage.label().to_string());
            if let Some(cb) = cb {
                cb.on_stage_complete(stage, fallback.len(), true);
            }
            Ok(fallback.to_string())
        }
        Err(e) => {
            if let Some(cb) = cb {
                cb.on_stage_error(stage, &e);
            }
            Err(ChartReadError::StageFailed {
                stage: stage.label().to_string(),
                detail: e,
            })
        }
    }
}

fn extract_options(config: &AnalysisConfig) -> ExtractOptions {
    config.ocr.as_ref().map(ExtractOptions::from).unwrap_or_default()
}

/// Human-readable label for a source: its file name.
fn describe(source: &str) -> String {
    Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source)
        .to_string()
}

/// Use the injected service, else a Read API client for the configured
/// (or environment-provided) endpoint.
fn resolve_read_service(config: &AnalysisConfig) -> Result<Arc<dyn ReadService>, ChartReadError> {
    if let Some(ref service) = config.read_service {
        return Ok(Arc::clone(service));
    }
    let ocr_config = match config.ocr {
        Some(ref c) => c.clone(),
        None => OcrConfig::from_env()?,
    };
    Ok(Arc::new(ReadClient::new(ocr_config)?))
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ChartReadError> {
    debug!("Creating LLM provider {} / {}", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ChartReadError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the language model, from most-specific to least-specific.
///
/// 1. **Pre-built model** (`config.language_model`), used as-is. Tests
///    inject fakes here.
/// 2. **Pre-built provider** (`config.provider`), wrapped in [`ProviderModel`].
/// 3. **Named provider + model** (`config.provider_name`); the model
///    defaults to [`DEFAULT_MODEL`].
/// 4. **Environment pair** (`CHARTREAD_LLM_PROVIDER` + `CHARTREAD_MODEL`).
/// 5. **Azure OpenAI** when `AZURE_OPENAI_ENDPOINT` is set.
/// 6. **OpenAI** when `OPENAI_API_KEY` is set.
/// 7. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_language_model(
    config: &AnalysisConfig,
) -> Result<Arc<dyn LanguageModel>, ChartReadError> {
    if let Some(ref model) = config.language_model {
        return Ok(Arc::clone(model));
    }
    resolve_provider(config).map(|p| Arc::new(ProviderModel::new(p)) as Arc<dyn LanguageModel>)
}

fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, ChartReadError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("CHARTREAD_LLM_PROVIDER"),
        std::env::var("CHARTREAD_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    for (var, provider) in [("AZURE_OPENAI_ENDPOINT", "azure"), ("OPENAI_API_KEY", "openai")] {
        if std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false) {
            return create_provider(provider, model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ChartReadError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set AZURE_OPENAI_ENDPOINT, OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_uses_file_name() {
        assert_eq!(describe("/tmp/charts/sales.png"), "sales.png");
        assert_eq!(describe("https://example.com/a/b.pdf"), "b.pdf");
        assert_eq!(describe("chart.jpg"), "chart.jpg");
    }

    #[test]
    fn extract_options_follow_ocr_config() {
        let config = AnalysisConfig::default();
        assert_eq!(extract_options(&config), ExtractOptions::default());

        let mut ocr = OcrConfig::new("https://example.cognitiveservices.azure.com", "k");
        ocr.poll.max_attempts = 5;
        let config = AnalysisConfig::builder().ocr(ocr).build().unwrap();
        assert_eq!(extract_options(&config).poll.max_attempts, 5);
    }

    #[tokio::test]
    async fn missing_input_fails_uniformly() {
        let report = analyze("/no/such/chart.png", &AnalysisConfig::default()).await;
        assert!(!report.is_success());
        assert_eq!(report.preview_path, None);
        assert_eq!(report.short_description, report.extracted_text);
        assert!(report
            .conclusion
            .starts_with("An unexpected error occurred during processing: File not found"));
    }
}
