//! The orchestrator state machine.
//!
//! ```text
//! Extract ──▶ DecideOcr ──┬──────────────────────────────▶ Parse ──▶ DecideParseResult ──┬─▶ Done
//!                         └─▶ Ocr ──▶ CheckOcrQuality ──▶ ┘   ▲                          ├─▶ Fail
//!                                                             └──────── next model ◀─────┘
//! ```
//!
//! Each stage reads the state and returns a [`StatePatch`]. Routing
//! decisions are pure functions of the state so they can be tested without
//! any I/O.

use super::ocr::{render_document, transcribe, OcrInput};
use super::parse::{extract_structured, StructuredExtractionResult};
use super::resolve_provider;
use super::state::{PipelineState, StatePatch};
use crate::config::{OcrPreference, ParserConfig};
use crate::extract::{detect_kind, extract_document, ExtractionMethod, PdfEngine};
use crate::output::{ParseMetadata, PipelineResult, UsageEntry, UsageStep};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::provider::{ChatOptions, ProviderRegistry};
use crate::quality::{score_quality_with, QualityThresholds};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    DecideOcr,
    Ocr,
    CheckOcrQuality,
    Parse,
    DecideParseResult,
    Done,
    Fail,
}

/// Everything a run needs besides its own state.
pub struct Pipeline {
    registry: Arc<ProviderRegistry>,
    engine: Arc<dyn PdfEngine>,
    options: ChatOptions,
    dpi: u32,
    max_pixels: u32,
    quality: QualityThresholds,
    progress: ProgressCallback,
}

impl Pipeline {
    pub fn new(
        config: &ParserConfig,
        registry: Arc<ProviderRegistry>,
        engine: Arc<dyn PdfEngine>,
    ) -> Self {
        Self {
            registry,
            engine,
            options: ChatOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            quality: config.quality,
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        }
    }

    pub(crate) fn progress(&self) -> &ProgressCallback {
        &self.progress
    }

    /// Drive `state` to a terminal stage.
    pub async fn run(&self, mut state: PipelineState) -> PipelineState {
        let mut stage = Stage::Extract;
        loop {
            debug!(?stage, "Entering stage");
            stage = match stage {
                Stage::Extract => {
                    state.apply(self.extract(&state).await);
                    Stage::DecideOcr
                }
                Stage::DecideOcr => route_ocr(&state),
                Stage::Ocr => {
                    state.apply(self.ocr(&state).await);
                    Stage::CheckOcrQuality
                }
                Stage::CheckOcrQuality => {
                    state.apply(check_ocr_quality(&state));
                    Stage::Parse
                }
                Stage::Parse => {
                    state.apply(self.parse(&state).await);
                    Stage::DecideParseResult
                }
                Stage::DecideParseResult => {
                    state.apply(check_parse(&state));
                    route_parse_result(&state)
                }
                Stage::Done | Stage::Fail => return state,
            };
        }
    }

    /// Run and summarise, reporting completion to the progress callback.
    pub async fn execute(&self, state: PipelineState) -> PipelineResult {
        let start = Instant::now();
        info!(
            filename = %state.filename,
            parse_chain = %state.parse_chain,
            ocr_chain = %state.ocr_chain,
            ocr = %state.ocr_preference,
            "Pipeline started"
        );

        let final_state = self.run(state).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let result = into_result(final_state, elapsed_ms);

        info!(
            success = result.success,
            usage_entries = result.metadata.usage.len(),
            elapsed_ms,
            "Pipeline completed"
        );
        self.progress.on_pipeline_complete(result.success, elapsed_ms);
        result
    }

    async fn extract(&self, state: &PipelineState) -> StatePatch {
        let extracted = extract_document(
            Arc::clone(&self.engine),
            Arc::clone(&state.content),
            &state.content_type,
            &state.filename,
        )
        .await;

        let result = match extracted {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, filename = %state.filename, "Extraction failed");
                return StatePatch {
                    text: Some(String::new()),
                    ..StatePatch::error(e.to_string())
                };
            }
        };

        let quality = score_quality_with(&result.text, &self.quality);
        info!(
            method = result.method.as_str(),
            pages = result.pages,
            text_sufficient = quality.sufficient,
            "Extracted text scored"
        );
        self.progress
            .on_extraction_complete(result.method.as_str(), result.pages, result.char_count());
        self.progress.on_quality_scored(&quality);

        StatePatch {
            text: Some(result.text.clone()),
            extraction: Some(result),
            quality: Some(quality),
            ..StatePatch::default()
        }
    }

    /// Render once, then walk the OCR chain from the cursor.
    async fn ocr(&self, state: &PipelineState) -> StatePatch {
        let gave_up = |usage: Vec<UsageEntry>, cursor: usize| StatePatch {
            ocr_attempted: Some(true),
            ocr_text: Some(None),
            usage,
            ocr_cursor: Some(cursor),
            ..StatePatch::default()
        };

        let kind = state
            .extraction
            .as_ref()
            .map(|e| e.kind)
            .unwrap_or_else(|| detect_kind(&state.content_type, &state.filename));
        let input = OcrInput {
            kind,
            content: Arc::clone(&state.content),
            content_type: state.content_type.clone(),
            dpi: self.dpi,
            max_pixels: self.max_pixels,
        };

        let pages = match render_document(Arc::clone(&self.engine), &input).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "OCR rendering failed, continuing without OCR");
                return gave_up(Vec::new(), state.ocr_cursor);
            }
        };
        if pages.is_empty() {
            info!(kind = kind.label(), "No pages to OCR");
            return gave_up(Vec::new(), state.ocr_cursor);
        }

        let total = state.ocr_chain.len();
        let mut cursor = state.ocr_cursor;
        let mut usage = Vec::new();

        while let Some(model) = state.ocr_chain.get(cursor) {
            self.progress.on_ocr_attempt(model, cursor + 1, total);
            info!(model = %model, attempt = cursor + 1, "OCR attempt");

            let outcome = match resolve_provider(&self.registry, model) {
                Ok(provider) => {
                    transcribe(provider.as_ref(), model, pages.clone(), &self.options).await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(out) => {
                    let chars = out.text.chars().count();
                    usage.push(UsageEntry::new(UsageStep::Ocr, model, out.usage));
                    self.progress.on_ocr_complete(model, chars);
                    info!(model = %model, text_length = chars, "OCR complete");
                    return StatePatch {
                        ocr_attempted: Some(true),
                        ocr_text: Some(Some(out.text)),
                        usage,
                        ocr_cursor: Some(cursor),
                        ..StatePatch::default()
                    };
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "OCR attempt failed");
                    self.progress.on_ocr_error(model, &e.to_string());
                    usage.push(UsageEntry::failed(UsageStep::Ocr, model));
                    cursor += 1;
                }
            }
        }

        warn!(attempts = usage.len(), "OCR chain exhausted, continuing with extracted text");
        gave_up(usage, cursor)
    }

    async fn parse(&self, state: &PipelineState) -> StatePatch {
        if state.error.is_some() {
            return StatePatch::default();
        }

        let cursor = state.parse_cursor;
        let Some(model) = state.parse_chain.get(cursor) else {
            return StatePatch::error("Parse chain is empty");
        };
        self.progress
            .on_parse_attempt(model, cursor + 1, state.parse_chain.len());
        info!(model = %model, attempt = cursor + 1, "Parse attempt");

        let (result, entry) =
            match extract_structured(&self.registry, &state.text, model, &self.options).await {
                Ok(result) => {
                    let entry = UsageEntry::new(UsageStep::Parse, model, result.usage);
                    (result, entry)
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Parse call failed");
                    (
                        StructuredExtractionResult::from_provider_error(&e),
                        UsageEntry::failed(UsageStep::Parse, model),
                    )
                }
            };

        if !result.success {
            self.progress.on_parse_error(model, &result.validation_errors);
        }

        StatePatch {
            parse_result: Some(result),
            usage: vec![entry],
            ..StatePatch::default()
        }
    }
}

/// Whether to OCR before parsing.
///
/// A recorded error, `skip`, or an empty OCR chain always go straight to
/// parsing; `force` always OCRs; `auto` OCRs only when the extracted text
/// is not sufficient.
pub fn route_ocr(state: &PipelineState) -> Stage {
    if state.error.is_some() {
        return Stage::Parse;
    }
    match state.ocr_preference {
        OcrPreference::Skip => Stage::Parse,
        _ if state.ocr_chain.is_empty() => Stage::Parse,
        OcrPreference::Force => Stage::Ocr,
        OcrPreference::Auto => {
            if state.quality.as_ref().is_some_and(|q| q.sufficient) {
                Stage::Parse
            } else {
                Stage::Ocr
            }
        }
    }
}

/// Use the OCR text only if it is strictly longer than the current text.
pub fn check_ocr_quality(state: &PipelineState) -> StatePatch {
    let current = state.text.chars().count();
    match state.ocr_text.as_deref() {
        Some(ocr) if ocr.chars().count() > current => {
            info!(
                using_ocr = true,
                ocr_length = ocr.chars().count(),
                original_length = current,
                "OCR quality check"
            );
            StatePatch {
                text: Some(ocr.to_string()),
                ocr_selected: Some(true),
                ..StatePatch::default()
            }
        }
        other => {
            info!(
                using_ocr = false,
                ocr_length = other.map_or(0, |t| t.chars().count()),
                original_length = current,
                "OCR quality check"
            );
            StatePatch {
                ocr_selected: Some(false),
                ..StatePatch::default()
            }
        }
    }
}

/// Accept the parse result, move to the next model, or give up.
pub fn check_parse(state: &PipelineState) -> StatePatch {
    if state.error.is_some() {
        return StatePatch::default();
    }
    let Some(result) = state.parse_result.as_ref() else {
        return StatePatch::error("No parse result available");
    };

    if let (true, Some(data)) = (result.success, result.data.as_ref()) {
        return StatePatch {
            resume_data: Some(data.clone()),
            ..StatePatch::default()
        };
    }

    let next = state.parse_cursor + 1;
    if let Some(model) = state.parse_chain.get(next) {
        info!(model = %model, attempt = next + 1, "Retrying parse with next model");
        return StatePatch {
            parse_cursor: Some(next),
            ..StatePatch::default()
        };
    }

    let message = format!(
        "All parse models exhausted. Last errors: {}",
        result.validation_errors.join("; ")
    );
    error!(error = %message, "Parse chain exhausted");
    StatePatch::error(message)
}

pub fn route_parse_result(state: &PipelineState) -> Stage {
    if state.resume_data.is_some() {
        Stage::Done
    } else if state.error.is_some() {
        Stage::Fail
    } else {
        Stage::Parse
    }
}

/// Summarise a terminal state.
pub fn into_result(state: PipelineState, processing_time_ms: u64) -> PipelineResult {
    let ocr_used = state.ocr_selected;
    let extraction_method = if ocr_used {
        "ocr".to_string()
    } else {
        state
            .extraction
            .as_ref()
            .map_or(ExtractionMethod::None, |e| e.method)
            .as_str()
            .to_string()
    };

    PipelineResult {
        success: state.resume_data.is_some(),
        data: state.resume_data,
        metadata: ParseMetadata {
            extraction_method,
            ocr_used,
            pages: state.extraction.as_ref().map_or(0, |e| e.pages),
            processing_time_ms,
            usage: state.usage,
        },
        error: state.error,
    }
}
