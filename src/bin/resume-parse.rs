//! CLI binary for resume-parser.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ParserConfig` and prints the `PipelineResult` as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_parser::{
    ModelRef, OcrPreference, ParseOptions, ParserConfig, PipelineProgressCallback,
    PipelineResult, ProgressCallback, ResumeParser, TextQuality,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// Keep error lines on one terminal row.
fn truncate(msg: &str) -> String {
    if msg.chars().count() > 80 {
        let head: String = msg.chars().take(79).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current step, with one
/// log line per finished step printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Parse attempts that produced no valid data.
    parse_failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            parse_failures: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, method: &str, pages: usize, char_count: usize) {
        self.bar.println(format!(
            "  {} Extracted  {:<12} {}",
            green("✓"),
            method,
            dim(&format!("{pages} pages, {char_count} chars")),
        ));
    }

    fn on_quality_scored(&self, quality: &TextQuality) {
        let verdict = if quality.sufficient {
            green("sufficient")
        } else {
            cyan("insufficient")
        };
        self.bar.println(format!(
            "  {} Quality    {:<12} {}",
            cyan("◆"),
            verdict,
            dim(&format!(
                "{} words, {:.0}% letters",
                quality.word_count,
                quality.alpha_ratio * 100.0
            )),
        ));
    }

    fn on_ocr_attempt(&self, model: &ModelRef, attempt: usize, total: usize) {
        self.bar.set_prefix("OCR");
        self.bar.set_message(format!("{model}  ({attempt}/{total})"));
    }

    fn on_ocr_complete(&self, model: &ModelRef, char_count: usize) {
        self.bar.println(format!(
            "  {} OCR        {}  {}",
            green("✓"),
            model,
            dim(&format!("{char_count} chars")),
        ));
    }

    fn on_ocr_error(&self, model: &ModelRef, error: &str) {
        self.bar.println(format!(
            "  {} OCR        {}  {}",
            red("✗"),
            model,
            red(&truncate(error)),
        ));
    }

    fn on_parse_attempt(&self, model: &ModelRef, attempt: usize, total: usize) {
        self.bar.set_prefix("Parsing");
        self.bar.set_message(format!("{model}  ({attempt}/{total})"));
    }

    fn on_parse_error(&self, model: &ModelRef, errors: &[String]) {
        self.parse_failures.fetch_add(1, Ordering::SeqCst);
        let first = errors.first().map(String::as_str).unwrap_or("no valid data");
        let more = match errors.len() {
            0 | 1 => String::new(),
            n => format!(" (+{} more)", n - 1),
        };
        self.bar.println(format!(
            "  {} Parse      {}  {}{}",
            red("✗"),
            model,
            red(&truncate(first)),
            dim(&more),
        ));
    }

    fn on_pipeline_complete(&self, success: bool, elapsed_ms: u64) {
        self.bar.finish_and_clear();
        let failures = self.parse_failures.load(Ordering::SeqCst);
        if success {
            eprintln!(
                "{} Parsed in {}  {}",
                green("✔"),
                bold(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
                if failures > 0 {
                    dim(&format!("after {failures} failed attempt(s)"))
                } else {
                    String::new()
                },
            );
        } else {
            eprintln!(
                "{} Parsing failed after {:.1}s",
                red("✘"),
                elapsed_ms as f64 / 1000.0
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parse a PDF with the default model chains
  resume-parse resume.pdf

  # Try Claude first, fall back to GPT-4o mini
  resume-parse --parse-models anthropic/claude-3-haiku-20240307,openai/gpt-4o-mini cv.docx

  # Scanned resume: always OCR
  resume-parse --ocr force scan.pdf

  # No OCR at all, compact JSON for piping
  resume-parse --ocr-models none --compact resume.pdf | jq .data.personal_info

MODEL CHAINS:
  Every entry is provider/model; the model id may itself contain slashes.
  Entries are tried left to right until one returns valid output.
    openrouter/google/gemini-flash-1.5,openai/gpt-4o-mini
  Providers: openrouter, openai, anthropic. An OCR chain of "none" disables OCR.

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY       OpenRouter API key
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  OPENROUTER_BASE_URL      Override the OpenRouter endpoint
  OPENAI_BASE_URL          Override the OpenAI endpoint (any compatible server)
  ANTHROPIC_BASE_URL       Override the Anthropic endpoint
  DEFAULT_PARSE_MODELS     Default parse chain
  DEFAULT_OCR_MODELS       Default OCR chain
  MAX_FILE_SIZE_MB         Largest accepted document (default 10)
  REQUEST_TIMEOUT_SECONDS  Per-call HTTP timeout (default 60)
  OCR_DPI                  Page rendering DPI for OCR (default 200)
  PDFIUM_LIB_PATH          Path to libpdfium (file or directory)

  A .env file in the working directory is read first when present.

EXIT STATUS:
  0  data extracted and validated
  1  the pipeline ran but produced no valid data, or the request was rejected
"#;

/// Parse resumes into structured JSON using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "resume-parse",
    version,
    about = "Parse resumes (PDF, DOCX, text, images) into structured JSON",
    long_about = "Parse a resume into schema-validated JSON. Text is extracted algorithmically \
where possible, scanned documents fall back to a vision-model OCR chain, and structured \
extraction walks a chain of models until one returns valid data. Supports OpenRouter, OpenAI \
(and compatible servers) and Anthropic.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Resume file: .pdf, .docx, .txt, .md, .png, .jpg, .webp or .tiff.
    file: PathBuf,

    /// Parse chain, e.g. openrouter/google/gemini-flash-1.5,openai/gpt-4o-mini.
    #[arg(long, env = "DEFAULT_PARSE_MODELS")]
    parse_models: Option<String>,

    /// OCR chain of vision models; "none" disables OCR.
    #[arg(long, env = "DEFAULT_OCR_MODELS")]
    ocr_models: Option<String>,

    /// When to OCR: auto (only for poor text), force, or skip.
    #[arg(long, env = "RESUME_PARSE_OCR", value_enum, default_value = "auto")]
    ocr: OcrArg,

    /// Override the content type guessed from the file extension.
    #[arg(long)]
    content_type: Option<String>,

    /// Rendering DPI for OCR (72–400).
    #[arg(long, env = "OCR_DPI",
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: Option<u32>,

    /// Abort the whole run after this many seconds.
    #[arg(long, env = "RESUME_PARSE_TIMEOUT")]
    timeout: Option<u64>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "RESUME_PARSE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "RESUME_PARSE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME_PARSE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME_PARSE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Auto,
    Force,
    Skip,
}

impl From<OcrArg> for OcrPreference {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Auto => OcrPreference::Auto,
            OcrArg::Force => OcrPreference::Force,
            OcrArg::Skip => OcrPreference::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap so its values can back the `env` attributes.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports every step, so library INFO logs would
    // only interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let parser = ResumeParser::new(config).context("Invalid configuration")?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    let options = ParseOptions {
        content_type: cli.content_type.clone(),
        ..ParseOptions::default()
    };
    let result = parser
        .parse_file(&cli.file, options)
        .await
        .with_context(|| format!("Failed to parse {}", cli.file.display()))?;

    write_result(&cli, &result)?;

    if !cli.quiet {
        print_summary(&result, show_progress);
    }
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `ParserConfig`, starting from the environment.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ParserConfig> {
    let mut config = ParserConfig::from_env().context("Invalid environment configuration")?;

    if let Some(ref chain) = cli.parse_models {
        config.parse_models = chain.clone();
    }
    if let Some(ref chain) = cli.ocr_models {
        config.ocr_models = chain.clone();
    }
    if let Some(dpi) = cli.dpi {
        config.dpi = dpi;
    }
    config.ocr = cli.ocr.into();
    config.max_tokens = cli.max_tokens;
    config.pipeline_timeout_secs = cli.timeout;
    config.progress_callback = progress;

    config.parse_chain().context("Invalid --parse-models")?;
    config.ocr_chain().context("Invalid --ocr-models")?;
    Ok(config)
}

fn write_result(cli: &Cli, result: &PipelineResult) -> Result<()> {
    let json = if cli.compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    }
    .context("Failed to serialise result")?;

    if let Some(ref path) = cli.output {
        std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;
    Ok(())
}

fn print_summary(result: &PipelineResult, show_progress: bool) {
    let meta = &result.metadata;
    if !show_progress {
        match (&result.error, result.success) {
            (_, true) => eprintln!("Parsed in {}ms", meta.processing_time_ms),
            (Some(err), false) => eprintln!("Parsing failed: {err}"),
            (None, false) => eprintln!("Parsing failed"),
        }
    } else if let Some(ref err) = result.error {
        eprintln!("   {}", red(&truncate(err)));
    }
    eprintln!(
        "   {} via {}  /  {} tokens in  /  {} tokens out",
        dim(&format!("{} pages", meta.pages)),
        meta.extraction_method,
        dim(&meta.total_input_tokens().to_string()),
        dim(&meta.total_output_tokens().to_string()),
    );
}
