//! Text-quality heuristic that decides whether OCR is needed.
//!
//! Algorithmic extraction from scanned or image-only PDFs yields either
//! nothing or a handful of glyph fragments. Three cheap measurements catch
//! both cases without a model call:
//!
//! | Criterion        | Default | Catches                               |
//! |------------------|---------|---------------------------------------|
//! | character count  | ≥ 100   | empty / near-empty extraction         |
//! | word count       | ≥ 20    | a title page with no body             |
//! | alphabetic ratio | ≥ 0.5   | symbol soup from broken font encodings |
//!
//! All three must hold for the text to be considered sufficient.

use serde::{Deserialize, Serialize};

pub const MIN_CHARS: usize = 100;
pub const MIN_WORDS: usize = 20;
pub const MIN_ALPHA_RATIO: f64 = 0.5;

/// Thresholds for [`score_quality_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_chars: usize,
    pub min_words: usize,
    pub min_alpha_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_chars: MIN_CHARS,
            min_words: MIN_WORDS,
            min_alpha_ratio: MIN_ALPHA_RATIO,
        }
    }
}

/// A criterion that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFailure {
    TooFewChars,
    TooFewWords,
    LowAlphaRatio,
}

/// Result of scoring a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextQuality {
    /// Unicode scalar values, not bytes.
    pub char_count: usize,
    pub word_count: usize,
    /// Alphabetic characters over non-whitespace characters; 0.0 when the
    /// text has no non-whitespace characters.
    pub alpha_ratio: f64,
    /// Fraction of criteria met: 0, 1/3, 2/3 or 1. Diagnostic only.
    pub score: f64,
    pub sufficient: bool,
    pub failures: Vec<QualityFailure>,
}

/// Score `text` against the default thresholds.
pub fn score_quality(text: &str) -> TextQuality {
    score_quality_with(text, &QualityThresholds::default())
}

/// Score `text` against custom thresholds.
pub fn score_quality_with(text: &str, thresholds: &QualityThresholds) -> TextQuality {
    let char_count = text.chars().count();
    let word_count = text.split_whitespace().count();

    let (alpha, non_ws) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(a, n), c| {
            (a + usize::from(c.is_alphabetic()), n + 1)
        });
    let alpha_ratio = if non_ws == 0 {
        0.0
    } else {
        alpha as f64 / non_ws as f64
    };

    let mut failures = Vec::new();
    if char_count < thresholds.min_chars {
        failures.push(QualityFailure::TooFewChars);
    }
    if word_count < thresholds.min_words {
        failures.push(QualityFailure::TooFewWords);
    }
    if alpha_ratio < thresholds.min_alpha_ratio {
        failures.push(QualityFailure::LowAlphaRatio);
    }

    let met = 3 - failures.len();
    TextQuality {
        char_count,
        word_count,
        alpha_ratio,
        score: met as f64 / 3.0,
        sufficient: failures.is_empty(),
        failures,
    }
}

pub fn is_text_sufficient(text: &str) -> bool {
    score_quality(text).sufficient
}
