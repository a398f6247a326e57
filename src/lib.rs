//! # resume-parser
//!
//! Turn resume documents (PDF, DOCX, plain text, scanned images) into
//! structured, schema-validated JSON using LLMs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Extract   algorithmic text (pdfium, DOCX XML, UTF-8)
//!  ├─ 2. Score     cheap quality gate: enough chars, words, letters?
//!  ├─ 3. OCR       optional: render pages, vision model over the OCR chain
//!  ├─ 4. Parse     LLM structured extraction over the parse chain
//!  ├─ 5. Validate  fence stripping + schema walk → ResumeData
//!  └─ 6. Output    PipelineResult with per-call token usage
//! ```
//!
//! Every model reference is written `provider/model` (for example
//! `openrouter/anthropic/claude-3-haiku`); a chain is a comma-separated list
//! tried left to right until one entry produces valid output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_parser::{ParseOptions, ParserConfig, ResumeParser};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keys come from OPENROUTER_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ParserConfig::builder()
//!         .parse_models("openrouter/anthropic/claude-3-haiku,openai/gpt-4o-mini")
//!         .build()?;
//!     let parser = ResumeParser::new(config)?;
//!     let result = parser.parse_file("resume.pdf", ParseOptions::default()).await?;
//!     if let Some(data) = &result.data {
//!         println!("{}", data.personal_info.name);
//!     }
//!     eprintln!(
//!         "tokens: {} in / {} out",
//!         result.metadata.total_input_tokens(),
//!         result.metadata.total_output_tokens()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-parse` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-parser = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model_chain;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod quality;
pub mod resume;
pub mod schema;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrPreference, ParserConfig, ParserConfigBuilder, ProviderSettings};
pub use error::{ConfigError, ExtractionError, OcrError, ParserError, PdfError, ProviderError};
pub use extract::{DocumentKind, ExtractionMethod, ExtractionResult, PdfEngine, PdfiumEngine};
pub use model_chain::{parse_chain, parse_ocr_chain, ModelChain, ModelRef};
pub use output::{ParseMetadata, PipelineResult, UsageEntry, UsageStep};
pub use parser::{ParseOptions, ParseRequest, ResumeParser};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use provider::{ChatProvider, ProviderRegistry};
pub use quality::{score_quality, TextQuality};
pub use resume::ResumeData;
pub use validate::{validate_llm_response, ValidationResult};
