//! State threaded through one pipeline run.
//!
//! Steps never mutate [`PipelineState`] directly: each returns a
//! [`StatePatch`] that [`PipelineState::apply`] merges. Merging appends to
//! the usage ledger and refuses to move a cursor backwards.

use super::parse::StructuredExtractionResult;
use crate::config::OcrPreference;
use crate::extract::ExtractionResult;
use crate::model_chain::ModelChain;
use crate::output::UsageEntry;
use crate::quality::TextQuality;
use crate::resume::ResumeData;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineState {
    // ── Inputs ──────────────────────────────────────────────────────────
    pub content: Arc<[u8]>,
    pub content_type: String,
    pub filename: String,
    pub parse_chain: ModelChain,
    pub ocr_chain: ModelChain,
    pub ocr_preference: OcrPreference,

    // ── Extraction ──────────────────────────────────────────────────────
    pub extraction: Option<ExtractionResult>,
    pub quality: Option<TextQuality>,
    /// Text handed to the parse step.
    pub text: String,

    // ── OCR ─────────────────────────────────────────────────────────────
    pub ocr_attempted: bool,
    pub ocr_text: Option<String>,
    /// OCR text replaced the algorithmic text.
    pub ocr_selected: bool,

    // ── Parse ───────────────────────────────────────────────────────────
    pub parse_result: Option<StructuredExtractionResult>,
    pub resume_data: Option<ResumeData>,

    // ── Tracking ────────────────────────────────────────────────────────
    pub usage: Vec<UsageEntry>,
    pub ocr_cursor: usize,
    pub parse_cursor: usize,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(
        content: Arc<[u8]>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
        parse_chain: ModelChain,
        ocr_chain: ModelChain,
        ocr_preference: OcrPreference,
    ) -> Self {
        Self {
            content,
            content_type: content_type.into(),
            filename: filename.into(),
            parse_chain,
            ocr_chain,
            ocr_preference,
            extraction: None,
            quality: None,
            text: String::new(),
            ocr_attempted: false,
            ocr_text: None,
            ocr_selected: false,
            parse_result: None,
            resume_data: None,
            usage: Vec::new(),
            ocr_cursor: 0,
            parse_cursor: 0,
            error: None,
        }
    }

    /// Merge a step's output.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(extraction) = patch.extraction {
            self.extraction = Some(extraction);
        }
        if let Some(quality) = patch.quality {
            self.quality = Some(quality);
        }
        if let Some(text) = patch.text {
            self.text = text;
        }
        if let Some(attempted) = patch.ocr_attempted {
            self.ocr_attempted = attempted;
        }
        if let Some(ocr_text) = patch.ocr_text {
            self.ocr_text = ocr_text;
        }
        if let Some(selected) = patch.ocr_selected {
            self.ocr_selected = selected;
        }
        if let Some(result) = patch.parse_result {
            self.parse_result = Some(result);
        }
        if let Some(data) = patch.resume_data {
            self.resume_data = Some(data);
        }
        if let Some(cursor) = patch.ocr_cursor {
            self.ocr_cursor = self.ocr_cursor.max(cursor);
        }
        if let Some(cursor) = patch.parse_cursor {
            self.parse_cursor = self.parse_cursor.max(cursor);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        self.usage.extend(patch.usage);
    }
}

/// Partial update produced by a step. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub extraction: Option<ExtractionResult>,
    pub quality: Option<TextQuality>,
    pub text: Option<String>,
    pub ocr_attempted: Option<bool>,
    /// `Some(None)` records that OCR produced nothing.
    pub ocr_text: Option<Option<String>>,
    pub ocr_selected: Option<bool>,
    pub parse_result: Option<StructuredExtractionResult>,
    pub resume_data: Option<ResumeData>,
    /// Appended to the ledger.
    pub usage: Vec<UsageEntry>,
    pub ocr_cursor: Option<usize>,
    pub parse_cursor: Option<usize>,
    pub error: Option<String>,
}

impl StatePatch {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_chain::ModelRef;
    use crate::output::UsageStep;

    fn state() -> PipelineState {
        PipelineState::new(
            Arc::from(&b""[..]),
            "text/plain",
            "cv.txt",
            ModelChain::new(vec![ModelRef::new("openai", "gpt-4o-mini")]),
            ModelChain::default(),
            OcrPreference::Auto,
        )
    }

    #[test]
    fn usage_is_append_only() {
        let m = ModelRef::new("openai", "gpt-4o-mini");
        let mut s = state();
        s.apply(StatePatch {
            usage: vec![UsageEntry::failed(UsageStep::Parse, &m)],
            ..StatePatch::default()
        });
        s.apply(StatePatch {
            usage: vec![UsageEntry::failed(UsageStep::Parse, &m)],
            ..StatePatch::default()
        });
        s.apply(StatePatch::default());
        assert_eq!(s.usage.len(), 2);
    }

    #[test]
    fn cursors_never_move_backwards() {
        let mut s = state();
        s.apply(StatePatch {
            parse_cursor: Some(2),
            ocr_cursor: Some(1),
            ..StatePatch::default()
        });
        s.apply(StatePatch {
            parse_cursor: Some(1),
            ocr_cursor: Some(0),
            ..StatePatch::default()
        });
        assert_eq!(s.parse_cursor, 2);
        assert_eq!(s.ocr_cursor, 1);
    }

    #[test]
    fn ocr_text_can_be_cleared() {
        let mut s = state();
        s.apply(StatePatch {
            ocr_text: Some(Some("scan".into())),
            ..StatePatch::default()
        });
        s.apply(StatePatch {
            ocr_text: Some(None),
            ..StatePatch::default()
        });
        assert_eq!(s.ocr_text, None);
    }

    #[test]
    fn untouched_fields_survive() {
        let mut s = state();
        s.apply(StatePatch {
            text: Some("hello".into()),
            ..StatePatch::default()
        });
        s.apply(StatePatch::error("boom"));
        assert_eq!(s.text, "hello");
        assert_eq!(s.error.as_deref(), Some("boom"));
    }
}
