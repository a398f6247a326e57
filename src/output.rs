//! Result types returned by [`crate::ResumeParser::parse`].
//!
//! A run that reaches a terminal state always produces a [`PipelineResult`];
//! failures of the document or of every parse model are reported through
//! `success == false` and `error`, not through `Err`.

use crate::model_chain::ModelRef;
use crate::provider::TokenUsage;
use crate::resume::ResumeData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline step that made a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStep {
    Ocr,
    Parse,
}

impl fmt::Display for UsageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ocr => "ocr",
            Self::Parse => "parse",
        })
    }
}

/// One provider call attempt. Failed attempts carry zero tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub step: UsageStep,
    /// Model name without the provider prefix.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageEntry {
    pub fn new(step: UsageStep, model: &ModelRef, usage: TokenUsage) -> Self {
        Self {
            step,
            model: model.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }

    pub fn failed(step: UsageStep, model: &ModelRef) -> Self {
        Self::new(step, model, TokenUsage::default())
    }
}

/// Diagnostics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMetadata {
    /// `ocr` when OCR text was used for parsing, otherwise the algorithmic
    /// extraction tag (`algorithmic` or `none`).
    pub extraction_method: String,
    pub ocr_used: bool,
    pub pages: usize,
    pub processing_time_ms: u64,
    /// Every provider call attempt in order.
    pub usage: Vec<UsageEntry>,
}

impl ParseMetadata {
    pub fn total_input_tokens(&self) -> u64 {
        self.usage.iter().map(|u| u.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.usage.iter().map(|u| u.output_tokens).sum()
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub data: Option<ResumeData>,
    pub metadata: ParseMetadata,
    pub error: Option<String>,
}
