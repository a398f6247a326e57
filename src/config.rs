//! Configuration types for resume parsing.
//!
//! All behaviour is controlled through [`ParserConfig`], built via its
//! [`ParserConfigBuilder`] or loaded from the environment with
//! [`ParserConfig::from_env`]. Model chains are kept as raw strings here and
//! resolved by [`crate::model_chain`] when a run starts, so a per-request
//! override goes through exactly the same validation as the default.

use crate::error::{ConfigError, ParserError};
use crate::model_chain::{parse_chain, parse_ocr_chain, ModelChain};
use crate::progress::ProgressCallback;
use crate::quality::QualityThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PARSE_MODELS: &str =
    "openrouter/google/gemini-flash-1.5,openrouter/openai/gpt-4o-mini";
pub const DEFAULT_OCR_MODELS: &str =
    "openrouter/google/gemini-flash-1.5,openrouter/google/gemini-pro-vision";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Names of the settings, used both as env vars and in error messages.
pub const PARSE_MODELS_VAR: &str = "DEFAULT_PARSE_MODELS";
pub const OCR_MODELS_VAR: &str = "DEFAULT_OCR_MODELS";

/// Whether OCR runs regardless of extraction quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrPreference {
    /// OCR only when the extracted text scores as insufficient. (default)
    #[default]
    Auto,
    /// Always OCR when an OCR chain is configured.
    Force,
    /// Never OCR.
    Skip,
}

impl FromStr for OcrPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "force" => Ok(Self::Force),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "invalid OCR preference '{other}' (expected auto, force or skip)"
            )),
        }
    }
}

impl fmt::Display for OcrPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Force => "force",
            Self::Skip => "skip",
        })
    }
}

/// Credentials and endpoints for the built-in providers.
#[derive(Clone)]
pub struct ProviderSettings {
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    /// Per-request HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: None,
            openai_api_key: None,
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_base_url: None,
            request_timeout_secs: 60,
        }
    }
}

impl ProviderSettings {
    /// Read keys and base URLs from the process environment.
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: non_empty_env("OPENROUTER_API_KEY"),
            openrouter_base_url: non_empty_env("OPENROUTER_BASE_URL"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_base_url: non_empty_env("OPENAI_BASE_URL"),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            anthropic_base_url: non_empty_env("ANTHROPIC_BASE_URL"),
            request_timeout_secs: 60,
        }
    }

    /// The API key configured for `provider`, if any.
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        let key = match provider {
            "openrouter" => &self.openrouter_api_key,
            "openai" => &self.openai_api_key,
            "anthropic" => &self.anthropic_api_key,
            _ => return None,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Environment variable holding the key for `provider`.
    pub fn key_var(provider: &str) -> String {
        format!("{}_API_KEY", provider.to_ascii_uppercase())
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderSettings")
            .field("openrouter_api_key", &redact(&self.openrouter_api_key))
            .field("openrouter_base_url", &self.openrouter_base_url)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Configuration for a resume-parsing run.
///
/// # Example
/// ```rust
/// use resume_parser::{OcrPreference, ParserConfig};
///
/// let config = ParserConfig::builder()
///     .parse_models("anthropic/claude-3-haiku-20240307,openai/gpt-4o-mini")
///     .ocr_models("none")
///     .ocr(OcrPreference::Skip)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParserConfig {
    /// Parse chain, `provider/model` entries separated by commas. Mandatory.
    pub parse_models: String,

    /// OCR chain. Empty or `none` disables OCR.
    pub ocr_models: String,

    /// OCR routing preference. Default: [`OcrPreference::Auto`].
    pub ocr: OcrPreference,

    /// DPI used when rasterising PDF pages for OCR. Range: 72–400. Default: 200.
    ///
    /// Resume fonts are small; 200 DPI keeps 8pt text legible to vision
    /// models while a two-page CV stays well under upload limits.
    pub dpi: u32,

    /// Maximum rendered image dimension in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Sampling temperature for every model call. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens a model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Largest accepted document in bytes. Default: 10 MiB.
    pub max_file_size_bytes: u64,

    /// Wall-clock limit for a whole run in seconds. Default: none.
    pub pipeline_timeout_secs: Option<u64>,

    /// Thresholds for the OCR quality gate.
    pub quality: QualityThresholds,

    /// Provider credentials, endpoints and HTTP timeout.
    pub providers: ProviderSettings,

    /// Optional step-event observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            parse_models: DEFAULT_PARSE_MODELS.to_string(),
            ocr_models: DEFAULT_OCR_MODELS.to_string(),
            ocr: OcrPreference::Auto,
            dpi: 200,
            max_rendered_pixels: 2000,
            temperature: 0.0,
            max_tokens: 4096,
            max_file_size_bytes: 10 * 1024 * 1024,
            pipeline_timeout_secs: None,
            quality: QualityThresholds::default(),
            providers: ProviderSettings::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("parse_models", &self.parse_models)
            .field("ocr_models", &self.ocr_models)
            .field("ocr", &self.ocr)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .field("pipeline_timeout_secs", &self.pipeline_timeout_secs)
            .field("quality", &self.quality)
            .field("providers", &self.providers)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl ParserConfig {
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DEFAULT_PARSE_MODELS` | [`DEFAULT_PARSE_MODELS`] |
    /// | `DEFAULT_OCR_MODELS` | [`DEFAULT_OCR_MODELS`] |
    /// | `OPENROUTER_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` | unset |
    /// | `OPENROUTER_BASE_URL`, `OPENAI_BASE_URL`, `ANTHROPIC_BASE_URL` | vendor endpoints |
    /// | `MAX_FILE_SIZE_MB` | 10 |
    /// | `REQUEST_TIMEOUT_SECONDS` | 60 |
    /// | `OCR_DPI` | 200 |
    ///
    /// Chains are validated here, so a bad `DEFAULT_PARSE_MODELS` fails at
    /// startup rather than on the first request.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // .env is optional

        let mut config = Self::default();
        if let Some(v) = non_empty_env(PARSE_MODELS_VAR) {
            config.parse_models = v;
        }
        if let Ok(v) = std::env::var(OCR_MODELS_VAR) {
            config.ocr_models = v;
        }
        if let Some(mb) = parse_env::<u64>("MAX_FILE_SIZE_MB")? {
            config.max_file_size_bytes = mb * 1024 * 1024;
        }
        if let Some(dpi) = parse_env::<u32>("OCR_DPI")? {
            config.dpi = dpi.clamp(72, 400);
        }

        config.providers = ProviderSettings::from_env();
        config.providers.request_timeout_secs =
            parse_env::<u64>("REQUEST_TIMEOUT_SECONDS")?.unwrap_or(60);

        config.parse_chain()?;
        config.ocr_chain()?;
        Ok(config)
    }

    /// Resolve the configured parse chain.
    pub fn parse_chain(&self) -> Result<ModelChain, ConfigError> {
        parse_chain(&self.parse_models, PARSE_MODELS_VAR)
    }

    /// Resolve the configured OCR chain (possibly empty).
    pub fn ocr_chain(&self) -> Result<ModelChain, ConfigError> {
        parse_ocr_chain(&self.ocr_models, OCR_MODELS_VAR)
    }

    /// Check that every provider referenced by the default chains has a key.
    pub fn validate_provider_credentials(&self) -> Result<(), ConfigError> {
        let parse = self.parse_chain()?;
        let ocr = self.ocr_chain()?;
        for provider in parse.providers().into_iter().chain(ocr.providers()) {
            if self.providers.api_key(provider).is_none() {
                return Err(ConfigError::MissingCredential {
                    provider: provider.to_string(),
                    env_var: ProviderSettings::key_var(provider),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    pub fn parse_models(mut self, chain: impl Into<String>) -> Self {
        self.config.parse_models = chain.into();
        self
    }

    pub fn ocr_models(mut self, chain: impl Into<String>) -> Self {
        self.config.ocr_models = chain.into();
        self
    }

    pub fn ocr(mut self, preference: OcrPreference) -> Self {
        self.config.ocr = preference;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn pipeline_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pipeline_timeout_secs = Some(secs);
        self
    }

    pub fn quality(mut self, thresholds: QualityThresholds) -> Self {
        self.config.quality = thresholds;
        self
    }

    pub fn providers(mut self, settings: ProviderSettings) -> Self {
        self.config.providers = settings;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.providers.request_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints and both chains.
    pub fn build(self) -> Result<ParserConfig, ParserError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ParserError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_file_size_bytes == 0 {
            return Err(ParserError::InvalidConfig(
                "max_file_size_bytes must be ≥ 1".into(),
            ));
        }
        if c.providers.request_timeout_secs == 0 {
            return Err(ParserError::InvalidConfig(
                "request_timeout_secs must be ≥ 1".into(),
            ));
        }
        c.parse_chain()?;
        c.ocr_chain()?;
        Ok(self.config)
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_empty_env(var) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ParserConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(c.providers.request_timeout_secs, 60);
        assert_eq!(c.ocr, OcrPreference::Auto);
        assert_eq!(c.parse_chain().unwrap().len(), 2);
        assert_eq!(c.ocr_chain().unwrap().len(), 2);
    }

    #[test]
    fn builder_clamps() {
        let c = ParserConfig::builder()
            .dpi(1000)
            .temperature(9.0)
            .max_rendered_pixels(3)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn build_rejects_bad_parse_chain() {
        let err = ParserConfig::builder().parse_models("none").build().unwrap_err();
        assert!(matches!(
            err,
            ParserError::Config(ConfigError::ParseChainRequired { .. })
        ));
    }

    #[test]
    fn build_accepts_disabled_ocr() {
        let c = ParserConfig::builder().ocr_models("none").build().unwrap();
        assert!(c.ocr_chain().unwrap().is_empty());
    }

    #[test]
    fn build_rejects_zero_tokens() {
        assert!(ParserConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn ocr_preference_parses_case_insensitively() {
        assert_eq!("FORCE".parse::<OcrPreference>().unwrap(), OcrPreference::Force);
        assert_eq!(" skip ".parse::<OcrPreference>().unwrap(), OcrPreference::Skip);
        assert!("sometimes".parse::<OcrPreference>().is_err());
        assert_eq!(OcrPreference::Auto.to_string(), "auto");
    }

    #[test]
    fn credentials_checked_per_referenced_provider() {
        let mut c = ParserConfig::builder()
            .parse_models("openrouter/google/gemini-flash-1.5")
            .ocr_models("anthropic/claude-3-haiku")
            .build()
            .unwrap();
        c.providers.openrouter_api_key = Some("sk-or".into());

        let err = c.validate_provider_credentials().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                provider: "anthropic".into(),
                env_var: "ANTHROPIC_API_KEY".into(),
            }
        );

        c.providers.anthropic_api_key = Some("sk-ant".into());
        assert!(c.validate_provider_credentials().is_ok());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let s = ProviderSettings {
            openai_api_key: Some("   ".into()),
            ..ProviderSettings::default()
        };
        assert_eq!(s.api_key("openai"), None);
        assert_eq!(s.api_key("unknown"), None);
    }

    #[test]
    fn debug_redacts_keys() {
        let s = ProviderSettings {
            openrouter_api_key: Some("sk-or-secret".into()),
            ..ProviderSettings::default()
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("sk-or-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
