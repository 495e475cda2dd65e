//! CLI binary for chartread.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` / `OcrConfig` and prints results.

use anyhow::{Context, Result};
use chartread::ocr::client::ReadClient;
use chartread::ocr::model::RecognitionRequest;
use chartread::ocr::session::OcrSession;
use chartread::ocr::{ExtractOptions, ReadService};
use chartread::pipeline::input::{resolve_input, SUPPORTED_EXTENSIONS};
use chartread::{
    analyze, AnalysisConfig, AnalysisProgressCallback, AnalysisReport, OcrConfig, PollSchedule,
    ProgressCallback, RateLimitPolicy, Stage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current stage, plus one
/// log line per finished stage. Each analysis gets its own spinner.
struct CliProgressCallback {
    bar: Mutex<ProgressBar>,
    stage_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

fn new_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Preparing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(new_spinner()),
            stage_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn bar(&self) -> ProgressBar {
        self.bar.lock().unwrap().clone()
    }

    /// Replace a spinner finished by the previous analysis.
    fn restart(&self) -> ProgressBar {
        let mut bar = self.bar.lock().unwrap();
        if bar.is_finished() {
            *bar = new_spinner();
        } else {
            bar.reset_elapsed();
        }
        bar.clone()
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, source: &str) {
        self.restart()
            .println(format!("{} {}", cyan("◆"), bold(&format!("Analysing {source}…"))));
    }

    fn on_stage_start(&self, stage: Stage) {
        *self.stage_started.lock().unwrap() = Some(Instant::now());
        let bar = self.bar();
        bar.set_prefix(stage.label());
        bar.set_message(match stage {
            Stage::Ocr => "submitting…",
            _ => "waiting for model…",
        });
    }

    fn on_poll(&self, attempt: u32, max_attempts: u32, status: &str) {
        self.bar()
            .set_message(format!("{status} (check {attempt}/{max_attempts})"));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize, used_fallback: bool) {
        let mark = if used_fallback { cyan("⚠") } else { green("✓") };
        let note = if used_fallback { "  fallback" } else { "" };
        self.bar().println(format!(
            "  {} {:<14} {}  {}{}",
            mark,
            stage.label(),
            dim(&format!("{output_len:>5} chars")),
            self.stage_elapsed(),
            note,
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar().println(format!(
            "  {} {:<14} {}  {}",
            red("✗"),
            stage.label(),
            red(&msg),
            self.stage_elapsed(),
        ));
    }

    fn on_analysis_complete(&self, success: bool) {
        self.bar().finish_and_clear();
        if success {
            eprintln!("{} analysis complete", green("✔"));
        } else {
            eprintln!("{} analysis failed", red("✘"));
        }
    }
}

/// Upper bound for `--rate-limit-retries` and `--max-retries`.
const MAX_RETRY_FLAG: i64 = 10;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a chart image
  chartread sales.png

  # Analyse a PDF from a URL, JSON output
  chartread --json https://example.com/report.pdf

  # OCR only, with a language hint
  chartread --ocr-only --language en scan.jpg

  # OCR several files and export the results
  chartread --ocr-only --export-json results.json --export-text-dir out/ a.png b.pdf

ENVIRONMENT VARIABLES:
  VISION_ENDPOINT         Read API endpoint (https://<resource>.cognitiveservices.azure.com)
  VISION_KEY              Read API subscription key
  AZURE_VISION_ENDPOINT   Alternative name for VISION_ENDPOINT
  AZURE_VISION_KEY        Alternative name for VISION_KEY
  AZURE_OPENAI_ENDPOINT   Selects Azure OpenAI for the interpretation and summaries
  OPENAI_API_KEY          Selects OpenAI when no Azure endpoint is set
  CHARTREAD_LLM_PROVIDER  Override provider (azure, openai, anthropic, gemini, ollama)
  CHARTREAD_MODEL         Override model ID (default: gpt-4o)

  A .env file in the working directory is loaded before flags are parsed.
"#;

/// Read charts with OCR and explain them with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "chartread",
    version,
    about = "Read charts with OCR and explain them with an LLM",
    long_about = "Extract text from chart images and PDFs with the Azure Read API, then ask an \
LLM to interpret the chart and write a one-sentence description and a short conclusion.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local chart files (PNG, JPG, JPEG, PDF) or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Only run OCR and print the extracted text with a quality report.
    #[arg(long, env = "CHARTREAD_OCR_ONLY")]
    ocr_only: bool,

    /// Write every OCR result to this JSON file (with --ocr-only).
    #[arg(long, env = "CHARTREAD_EXPORT_JSON", requires = "ocr_only")]
    export_json: Option<PathBuf>,

    /// Write one text file per OCR result into this directory (with --ocr-only).
    #[arg(long, env = "CHARTREAD_EXPORT_TEXT_DIR", requires = "ocr_only")]
    export_text_dir: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, env = "CHARTREAD_JSON")]
    json: bool,

    /// OCR language hint (e.g. en, de); auto-detected when omitted.
    #[arg(long, env = "CHARTREAD_LANGUAGE")]
    language: Option<String>,

    /// LLM provider: azure, openai, anthropic, gemini, ollama.
    #[arg(long, env = "CHARTREAD_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gpt-4o).
    #[arg(long, env = "CHARTREAD_MODEL")]
    model: Option<String>,

    /// Read API endpoint.
    #[arg(long, env = "VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// Read API subscription key.
    #[arg(long, env = "VISION_KEY", hide_env_values = true)]
    vision_key: Option<String>,

    /// Maximum number of OCR status checks before giving up.
    #[arg(long, env = "CHARTREAD_MAX_POLL_ATTEMPTS", default_value_t = 30,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_poll_attempts: u32,

    /// Milliseconds between OCR status checks.
    #[arg(long, env = "CHARTREAD_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Resubmit this many times on HTTP 429 instead of reporting it (0 = report).
    #[arg(long, env = "CHARTREAD_RATE_LIMIT_RETRIES", default_value_t = 0,
          value_parser = clap::value_parser!(u32).range(..=MAX_RETRY_FLAG))]
    rate_limit_retries: u32,

    /// Retries per LLM stage on failure.
    #[arg(long, env = "CHARTREAD_MAX_RETRIES", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(..=MAX_RETRY_FLAG))]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CHARTREAD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Image shown as the preview of PDF inputs.
    #[arg(long, env = "CHARTREAD_PDF_ICON", default_value = chartread::config::DEFAULT_PDF_ICON)]
    pdf_icon: PathBuf,

    /// Disable progress output.
    #[arg(long, env = "CHARTREAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CHARTREAD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CHARTREAD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let ocr = build_ocr_config(&cli)?;

    if cli.ocr_only {
        return run_ocr_only(&cli, ocr, progress_cb).await;
    }

    // ── Full analysis ────────────────────────────────────────────────────
    let config = build_config(&cli, ocr, progress_cb)?;
    let mut reports = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        reports.push(analyze(input, &config).await);
    }

    if cli.json {
        let json = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else {
        for (input, report) in cli.inputs.iter().zip(&reports) {
            print_report(input, report, reports.len() > 1);
        }
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} analyses failed", reports.len());
    }
    Ok(())
}

/// OCR each input, print text and quality, optionally export.
async fn run_ocr_only(
    cli: &Cli,
    ocr: OcrConfig,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let options = ExtractOptions::from(&ocr);
    let client: Arc<dyn ReadService> =
        Arc::new(ReadClient::new(ocr).context("Failed to create Read API client")?);
    let mut session = OcrSession::new(client, options);
    if let Some(cb) = progress.clone() {
        session = session.with_progress(cb);
    }

    for input in &cli.inputs {
        let resolved = resolve_input(input, cli.download_timeout)
            .await
            .with_context(|| {
                format!("Cannot read {input} (supported: {})", SUPPORTED_EXTENSIONS.join(", "))
            })?;
        if let Some(ref cb) = progress {
            cb.on_analysis_start(&resolved.source);
            cb.on_stage_start(Stage::Ocr);
        }
        let request = RecognitionRequest::new(resolved.content, cli.language.clone());
        let result = session.extract(request, &resolved.source, input).await;
        if let Some(ref cb) = progress {
            match &result {
                Ok(doc) => cb.on_stage_complete(Stage::Ocr, doc.full_text.len(), doc.is_empty()),
                Err(e) => cb.on_stage_error(Stage::Ocr, &e.to_string()),
            }
            cb.on_analysis_complete(result.is_ok());
        }
        let doc = result.with_context(|| format!("OCR failed for {input}"))?;

        if !cli.json && !cli.quiet {
            let report = chartread::ocr::validate::validate(&doc.full_text);
            println!("{}", bold(&format!("── {input} ──")));
            println!("{}", doc.full_text);
            println!(
                "{}",
                dim(&format!(
                    "{} pages · {} lines · {} words · {:.0}ms · language {}",
                    doc.statistics.total_pages,
                    doc.statistics.total_lines,
                    doc.statistics.total_words,
                    doc.processing_time_ms,
                    doc.language
                ))
            );
            for issue in &report.issues {
                println!("  {} {}", cyan("⚠"), issue.description());
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&session.to_export())
            .context("Failed to serialise output")?;
        println!("{json}");
    } else if session.results().len() > 1 && !cli.quiet {
        println!("{}", bold("── comparison ──"));
        for row in session.compare() {
            println!(
                "  {:<30} {:>8.0}ms  {:>4} lines  {:>5} words  {}",
                row.description,
                row.processing_time_ms,
                row.total_lines,
                row.total_words,
                if row.issues.is_empty() {
                    green("clean")
                } else {
                    cyan(&format!("{} issue(s)", row.issues.len()))
                }
            );
        }
    }

    if let Some(ref path) = cli.export_json {
        let written = session.save_json(path).await.context("JSON export failed")?;
        if !cli.quiet {
            eprintln!("{} {}", green("✔"), bold(&written.display().to_string()));
        }
    }
    if let Some(ref dir) = cli.export_text_dir {
        let written = session
            .export_text_files(dir)
            .await
            .context("Text export failed")?;
        if !cli.quiet {
            eprintln!("{} {} text file(s) in {}", green("✔"), written.len(), dir.display());
        }
    }
    Ok(())
}

fn print_report(input: &str, report: &AnalysisReport, heading: bool) {
    if heading {
        println!("{}", bold(&format!("── {input} ──")));
    }
    if let Some(ref preview) = report.preview_path {
        println!("{} {}", dim("Preview:"), preview);
    }
    println!("{}\n{}\n", bold("Short description"), report.short_description);
    println!("{}\n{}\n", bold("Key insights"), report.key_insights);
    println!("{}\n{}\n", bold("Conclusion"), report.conclusion);
    println!("{}\n{}", bold("Extracted text"), report.extracted_text);
}

/// Map the Read API flags to `OcrConfig`.
fn build_ocr_config(cli: &Cli) -> Result<OcrConfig> {
    let mut ocr = match (&cli.vision_endpoint, &cli.vision_key) {
        (Some(endpoint), Some(key)) => OcrConfig::new(endpoint, key),
        _ => OcrConfig::from_env().context("Read API is not configured")?,
    };
    ocr.poll = PollSchedule::fixed(
        cli.max_poll_attempts,
        Duration::from_millis(cli.poll_interval_ms),
    );
    if cli.rate_limit_retries > 0 {
        ocr.rate_limit = RateLimitPolicy::retry(cli.rate_limit_retries, 1000);
    }
    ocr.validate().context("Invalid Read API configuration")?;
    Ok(ocr)
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(
    cli: &Cli,
    ocr: OcrConfig,
    progress: Option<ProgressCallback>,
) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .ocr(ocr)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .pdf_icon(cli.pdf_icon.clone());

    if let Some(ref lang) = cli.language {
        builder = builder.language(lang.clone());
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
