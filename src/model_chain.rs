//! Model fallback chains.
//!
//! A chain is written as a comma-separated list of `provider/model` entries,
//! for example `openrouter/google/gemini-flash-1.5,anthropic/claude-3-haiku`.
//! Only the first `/` separates the provider, so model names may contain
//! slashes of their own (OpenRouter namespaces every model by vendor).
//!
//! Chains are parsed once, before a run starts, so a typo in configuration
//! fails fast instead of surfacing halfway through a document.

use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;

/// Provider names a chain entry may reference.
pub const REGISTERED_PROVIDERS: &[&str] = &["anthropic", "openai", "openrouter"];

/// Sentinel that disables OCR when used as the whole OCR chain.
pub const NONE_SENTINEL: &str = "none";

/// One `(provider, model)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse a single trimmed chain entry against `providers`.
    fn parse_entry(entry: &str, field: &str, providers: &[&str]) -> Result<Self, ConfigError> {
        if entry.is_empty() {
            return Err(ConfigError::EmptyEntry {
                field: field.to_string(),
            });
        }
        let Some((provider, model)) = entry.split_once('/') else {
            return Err(ConfigError::MissingProviderPrefix {
                field: field.to_string(),
                entry: entry.to_string(),
            });
        };
        if !providers.contains(&provider) {
            return Err(ConfigError::UnknownProvider {
                field: field.to_string(),
                provider: provider.to_string(),
                entry: entry.to_string(),
                registered: providers.join(", "),
            });
        }
        Ok(Self::new(provider, model))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Ordered model references, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelChain(Vec<ModelRef>);

impl ModelChain {
    pub fn new(models: Vec<ModelRef>) -> Self {
        Self(models)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModelRef> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelRef> {
        self.0.iter()
    }

    /// Distinct provider names in first-seen order.
    pub fn providers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.0 {
            if !seen.contains(&m.provider.as_str()) {
                seen.push(&m.provider);
            }
        }
        seen
    }
}

impl fmt::Display for ModelChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl<'a> IntoIterator for &'a ModelChain {
    type Item = &'a ModelRef;
    type IntoIter = std::slice::Iter<'a, ModelRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<ModelRef>> for ModelChain {
    fn from(models: Vec<ModelRef>) -> Self {
        Self(models)
    }
}

/// Parse a mandatory chain (the parse chain).
///
/// `field` names the setting being parsed and is echoed in every error.
/// The whole string being empty or `none` is rejected: structured extraction
/// cannot be switched off.
pub fn parse_chain(raw: &str, field: &str) -> Result<ModelChain, ConfigError> {
    parse_chain_with(raw, field, REGISTERED_PROVIDERS)
}

/// [`parse_chain`] against an explicit provider list.
pub fn parse_chain_with(
    raw: &str,
    field: &str,
    providers: &[&str],
) -> Result<ModelChain, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(NONE_SENTINEL) {
        return Err(ConfigError::ParseChainRequired {
            field: field.to_string(),
        });
    }
    raw.split(',')
        .map(|entry| ModelRef::parse_entry(entry.trim(), field, providers))
        .collect::<Result<Vec<_>, _>>()
        .map(ModelChain)
}

/// Parse an optional chain (the OCR chain). Empty or `none` disables OCR.
pub fn parse_ocr_chain(raw: &str, field: &str) -> Result<ModelChain, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_SENTINEL) {
        return Ok(ModelChain::default());
    }
    parse_chain(trimmed, field)
}
