//! Library entry point.
//!
//! [`ResumeParser`] owns the configuration, the provider registry and the
//! PDF engine, and turns one [`ParseRequest`] into one [`PipelineResult`].
//! `Err` is reserved for problems with the request itself (a malformed chain
//! override, a provider that cannot be built, an oversized document, an
//! unreadable path); everything that goes wrong while processing a document
//! is reported inside the result.

use crate::config::{OcrPreference, ParserConfig};
use crate::error::ParserError;
use crate::extract::{guess_content_type, PdfEngine, PdfiumEngine};
use crate::model_chain::{parse_chain, parse_ocr_chain, ModelChain};
use crate::output::{ParseMetadata, PipelineResult};
use crate::pipeline::{Pipeline, PipelineState};
use crate::provider::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-request overrides. `None` falls back to the parser configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Overrides the content type guessed from the file extension.
    pub content_type: Option<String>,
    pub ocr: Option<OcrPreference>,
    /// Parse chain for this request only.
    pub parse_models: Option<String>,
    /// OCR chain for this request only; `none` disables OCR.
    pub ocr_models: Option<String>,
}

/// One document to parse.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub content: Vec<u8>,
    pub content_type: String,
    pub filename: String,
    pub ocr: Option<OcrPreference>,
    pub parse_models: Option<String>,
    pub ocr_models: Option<String>,
}

impl ParseRequest {
    pub fn new(
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            filename: filename.into(),
            ocr: None,
            parse_models: None,
            ocr_models: None,
        }
    }

    pub fn with_ocr(mut self, preference: OcrPreference) -> Self {
        self.ocr = Some(preference);
        self
    }

    pub fn with_parse_models(mut self, chain: impl Into<String>) -> Self {
        self.parse_models = Some(chain.into());
        self
    }

    pub fn with_ocr_models(mut self, chain: impl Into<String>) -> Self {
        self.ocr_models = Some(chain.into());
        self
    }

    /// Build a request from file contents and options.
    pub fn from_options(content: Vec<u8>, filename: impl Into<String>, options: ParseOptions) -> Self {
        let filename = filename.into();
        let content_type = options
            .content_type
            .unwrap_or_else(|| guess_content_type(&filename).to_string());
        Self {
            content,
            content_type,
            filename,
            ocr: options.ocr,
            parse_models: options.parse_models,
            ocr_models: options.ocr_models,
        }
    }
}

/// Parses resumes into [`crate::ResumeData`].
///
/// Cheap to share behind an `Arc`; concurrent [`parse`](Self::parse) calls
/// share the provider cache and nothing else.
pub struct ResumeParser {
    config: ParserConfig,
    registry: Arc<ProviderRegistry>,
    pipeline: Pipeline,
}

impl ResumeParser {
    /// Parser using the built-in providers and pdfium.
    ///
    /// Fails when a provider named in the configured chains has no API key.
    pub fn new(config: ParserConfig) -> Result<Self, ParserError> {
        config.validate_provider_credentials()?;
        let registry = Arc::new(ProviderRegistry::from_settings(config.providers.clone()));
        Ok(Self::with_components(config, registry, Arc::new(PdfiumEngine::new())))
    }

    /// Parser configured from the environment, using the process-wide
    /// provider registry.
    pub fn from_env() -> Result<Self, ParserError> {
        let config = ParserConfig::from_env()?;
        config.validate_provider_credentials()?;
        Ok(Self::with_components(
            config,
            ProviderRegistry::global(),
            Arc::new(PdfiumEngine::new()),
        ))
    }

    /// Parser with an explicit registry and PDF engine.
    pub fn with_components(
        config: ParserConfig,
        registry: Arc<ProviderRegistry>,
        engine: Arc<dyn PdfEngine>,
    ) -> Self {
        let pipeline = Pipeline::new(&config, Arc::clone(&registry), engine);
        Self {
            config,
            registry,
            pipeline,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run the pipeline over one document.
    pub async fn parse(&self, request: ParseRequest) -> Result<PipelineResult, ParserError> {
        let parse_chain = self.resolve_parse_chain(request.parse_models.as_deref())?;
        let ocr_chain = self.resolve_ocr_chain(request.ocr_models.as_deref())?;

        let size = request.content.len() as u64;
        if size > self.config.max_file_size_bytes {
            return Err(ParserError::FileTooLarge {
                size,
                max: self.config.max_file_size_bytes,
            });
        }

        self.resolve_providers(&parse_chain, &ocr_chain)?;

        info!(
            filename = %request.filename,
            content_type = %request.content_type,
            bytes = size,
            "Parse request received"
        );

        let state = PipelineState::new(
            Arc::from(request.content),
            request.content_type,
            request.filename,
            parse_chain,
            ocr_chain,
            request.ocr.unwrap_or(self.config.ocr),
        );

        let Some(secs) = self.config.pipeline_timeout_secs else {
            return Ok(self.pipeline.execute(state).await);
        };
        match tokio::time::timeout(Duration::from_secs(secs), self.pipeline.execute(state)).await {
            Ok(result) => Ok(result),
            Err(_) => {
                warn!(timeout_secs = secs, "Pipeline timed out");
                let elapsed_ms = secs.saturating_mul(1000);
                self.pipeline.progress().on_pipeline_complete(false, elapsed_ms);
                Ok(timed_out(secs, elapsed_ms))
            }
        }
    }

    /// Read `path` and parse it. The content type is guessed from the
    /// extension unless `options` sets one.
    pub async fn parse_file(
        &self,
        path: impl AsRef<Path>,
        options: ParseOptions,
    ) -> Result<PipelineResult, ParserError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|source| ParserError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        if meta.len() > self.config.max_file_size_bytes {
            return Err(ParserError::FileTooLarge {
                size: meta.len(),
                max: self.config.max_file_size_bytes,
            });
        }

        let content = tokio::fs::read(path)
            .await
            .map_err(|source| ParserError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.parse(ParseRequest::from_options(content, filename, options))
            .await
    }

    /// Blocking wrapper around [`parse_file`](Self::parse_file).
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn parse_file_sync(
        &self,
        path: impl AsRef<Path>,
        options: ParseOptions,
    ) -> Result<PipelineResult, ParserError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ParserError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.parse_file(path, options))
    }

    fn resolve_parse_chain(&self, raw: Option<&str>) -> Result<ModelChain, ParserError> {
        Ok(match non_blank(raw) {
            Some(raw) => parse_chain(raw, "parse_models")?,
            None => self.config.parse_chain()?,
        })
    }

    fn resolve_ocr_chain(&self, raw: Option<&str>) -> Result<ModelChain, ParserError> {
        Ok(match non_blank(raw) {
            Some(raw) => parse_ocr_chain(raw, "ocr_models")?,
            None => self.config.ocr_chain()?,
        })
    }

    /// Build (or fetch from the cache) every provider the chains name, so a
    /// missing key or unregistered name fails before any step runs.
    fn resolve_providers(&self, parse: &ModelChain, ocr: &ModelChain) -> Result<(), ParserError> {
        let mut seen: Vec<&str> = Vec::new();
        for name in parse.providers().into_iter().chain(ocr.providers()) {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            self.registry.resolve(name)?;
        }
        Ok(())
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

fn timed_out(secs: u64, elapsed_ms: u64) -> PipelineResult {
    PipelineResult {
        success: false,
        data: None,
        metadata: ParseMetadata {
            extraction_method: "none".into(),
            ocr_used: false,
            pages: 0,
            processing_time_ms: elapsed_ms,
            usage: Vec::new(),
        },
        error: Some(format!("Pipeline timed out after {secs}s")),
    }
}
