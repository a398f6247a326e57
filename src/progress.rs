//! Progress-callback trait for pipeline step events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ParserConfigBuilder::progress_callback`] to observe the
//! run as it moves through extraction, OCR and each parse attempt. The CLI
//! uses it to drive a terminal spinner; a service could forward the same
//! events to a job record.
//!
//! # Example
//!
//! ```rust
//! use resume_parser::{ModelRef, ParserConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct AttemptCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for AttemptCounter {
//!     fn on_parse_attempt(&self, model: &ModelRef, attempt: usize, total: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("parse {attempt}/{total} with {model}");
//!     }
//! }
//!
//! let config = ParserConfig::builder()
//!     .progress_callback(Arc::new(AttemptCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::model_chain::ModelRef;
use crate::quality::TextQuality;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Every method has a no-op default so implementors override only what
/// they need. Attempt numbers are 1-indexed.
pub trait PipelineProgressCallback: Send + Sync {
    /// Algorithmic extraction finished (possibly with empty text).
    fn on_extraction_complete(&self, method: &str, pages: usize, char_count: usize) {
        let _ = (method, pages, char_count);
    }

    /// The extracted text was scored.
    fn on_quality_scored(&self, quality: &TextQuality) {
        let _ = quality;
    }

    /// About to send the rendered pages to an OCR model.
    fn on_ocr_attempt(&self, model: &ModelRef, attempt: usize, total: usize) {
        let _ = (model, attempt, total);
    }

    fn on_ocr_complete(&self, model: &ModelRef, char_count: usize) {
        let _ = (model, char_count);
    }

    fn on_ocr_error(&self, model: &ModelRef, error: &str) {
        let _ = (model, error);
    }

    /// About to ask a model for structured output.
    fn on_parse_attempt(&self, model: &ModelRef, attempt: usize, total: usize) {
        let _ = (model, attempt, total);
    }

    /// A parse attempt produced no valid data.
    fn on_parse_error(&self, model: &ModelRef, errors: &[String]) {
        let _ = (model, errors);
    }

    /// Called once when the run reaches a terminal state.
    fn on_pipeline_complete(&self, success: bool, elapsed_ms: u64) {
        let _ = (success, elapsed_ms);
    }
}

/// Used when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ParserConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
