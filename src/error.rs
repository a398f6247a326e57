//! Error types for the resume-parser library.
//!
//! The pipeline distinguishes failures by how far they are allowed to travel:
//!
//! * [`ParserError`]: **Fatal before the run**. Bad configuration, a file
//!   that is too large, an unreadable path. Returned as `Err` from
//!   [`crate::ResumeParser::parse`] before any provider is contacted.
//!
//! * [`ConfigError`]: malformed model chains, unknown providers, missing
//!   credentials. Always surfaces before a step runs.
//!
//! * [`ExtractionError`]: the document could not be read. Recorded in the
//!   pipeline state and reported in [`crate::PipelineResult::error`]; no
//!   model is tried afterwards.
//!
//! * [`ProviderError`]: **Non-fatal**. One model call failed. The
//!   orchestrator records it and moves to the next entry of the chain.
//!
//! * [`PdfError`] / [`OcrError`]: engine-level failures that the extraction
//!   and OCR steps translate into the categories above.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the resume-parser facade.
///
/// Everything that happens after the pipeline starts is reported inside
/// [`crate::PipelineResult`] instead.
#[derive(Debug, Error)]
pub enum ParserError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Could not read the input file.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Uploaded document exceeds the configured size limit.
    #[error("File is {size} bytes, which exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Model chain or provider configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration problems detected while resolving model chains, providers
/// or environment settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: empty entry in chain (check for trailing commas or extra whitespace)")]
    EmptyEntry { field: String },

    #[error(
        "{field}: entry '{entry}' is missing a provider prefix (expected format: 'provider/model_name')"
    )]
    MissingProviderPrefix { field: String, entry: String },

    #[error("{field}: unknown provider '{provider}' in entry '{entry}'. Registered providers: {registered}")]
    UnknownProvider {
        field: String,
        provider: String,
        entry: String,
        registered: String,
    },

    /// The parse chain was empty or set to the `none` sentinel.
    #[error("{field} is required and cannot be empty or 'none'")]
    ParseChainRequired { field: String },

    /// The registry has no constructor for this provider name.
    #[error("Provider '{provider}' is not registered")]
    UnregisteredProvider { provider: String },

    /// A provider is used by a chain but its API key is absent.
    #[error("Provider '{provider}' is referenced in model chains but {env_var} is not configured")]
    MissingCredential { provider: String, env_var: String },

    /// The HTTP client for a provider could not be constructed.
    #[error("Failed to build HTTP client for provider '{provider}': {detail}")]
    HttpClient { provider: String, detail: String },

    /// An environment variable holds a value that cannot be parsed.
    #[error("{var}: invalid value '{value}': {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },
}

/// The document could not be turned into text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// Bytes claim to be a known format but cannot be parsed as one.
    #[error("Failed to extract text from {kind} '{filename}': {detail}")]
    Corrupt {
        filename: String,
        kind: &'static str,
        detail: String,
    },

    /// The PDF engine could not be loaded.
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal extraction error: {0}")]
    Internal(String),
}

/// Errors from a [`crate::extract::PdfEngine`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PdfError {
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    Binding(String),

    /// The document header, xref or trailer is unreadable.
    #[error("PDF is unreadable: {0}")]
    Unreadable(String),

    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },
}

/// Failures of the OCR step as a whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrError {
    /// Pages could not be rendered; OCR is skipped for this document.
    #[error("Failed to render document for OCR: {0}")]
    Render(String),

    /// The model call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A single failed call to an LLM provider.
///
/// Transport failures, non-success statuses, unparseable bodies and empty
/// completions all normalise into this one shape so the orchestrator can
/// treat every one of them as "advance to the next model".
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{provider}/{model}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    /// HTTP status when the provider answered with one.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}
