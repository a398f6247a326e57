//! Pipeline stages for resume parsing.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ quality ──▶ [ocr] ──▶ parse ──▶ validate
//! (pdfium/    (gate)     (vision   (LLM)     (schema)
//!  docx/text)             model)
//! ```
//!
//! 1. [`crate::extract`]: algorithmic text; pdfium runs in `spawn_blocking`
//! 2. [`crate::quality`]: decides whether OCR is worth a model call
//! 3. [`ocr`]: render pages, [`encode`] them, transcribe with the OCR chain
//! 4. [`parse`]: structured extraction with the parse chain
//! 5. [`graph`]: the state machine tying the steps together over
//!    [`state::PipelineState`]

pub mod encode;
pub mod graph;
pub mod ocr;
pub mod parse;
pub mod state;

pub use graph::{Pipeline, Stage};
pub use parse::StructuredExtractionResult;
pub use state::{PipelineState, StatePatch};

use crate::error::ProviderError;
use crate::model_chain::ModelRef;
use crate::provider::{ChatProvider, ProviderRegistry};
use std::sync::Arc;

/// Look up the provider for `model`.
///
/// [`crate::ResumeParser::parse`] resolves every chain provider up front, so
/// this only fails when a stage is driven directly or the registry changed
/// mid-run; the failure is then reported like a failed call.
pub(crate) fn resolve_provider(
    registry: &ProviderRegistry,
    model: &ModelRef,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    registry
        .resolve(&model.provider)
        .map_err(|e| ProviderError::new(&model.provider, &model.model, e.to_string()))
}
