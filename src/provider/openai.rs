//! OpenAI-compatible chat-completions backend.
//!
//! Serves both `openai` and `openrouter`: OpenRouter exposes the same
//! `/chat/completions` wire format and routes `vendor/model` names to the
//! underlying vendor. Only the base URL, key and attribution headers differ.

use super::{ChatMessage, ChatOptions, ChatProvider, ChatResponse, ContentPart, Role, TokenUsage};
use crate::config::{ProviderSettings, OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const APP_TITLE: &str = "resume-parser";
const APP_REFERER: &str = "https://github.com/resume-parser/resume-parser";

/// A provider speaking the OpenAI chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    name: String,
    /// Vendor name used in error messages, e.g. `OpenRouter`.
    label: &'static str,
    base_url: String,
    client: Client,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Build a provider for `name` talking to `base_url`.
    pub fn new(
        name: impl Into<String>,
        label: &'static str,
        base_url: impl Into<String>,
        api_key: &str,
        extra_headers: &[(&'static str, &str)],
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let client_error = |detail: String| ConfigError::HttpClient {
            provider: name.clone(),
            detail,
        };

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| client_error(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        for (key, value) in extra_headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| client_error(format!("invalid header {key}: {e}")))?;
            headers.insert(*key, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| client_error(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name,
            label,
            client,
            timeout_secs,
        })
    }

    /// The `openrouter` backend.
    pub fn openrouter(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let key = require_key(settings, "openrouter")?;
        Self::new(
            "openrouter",
            "OpenRouter",
            settings
                .openrouter_base_url
                .as_deref()
                .unwrap_or(OPENROUTER_BASE_URL),
            key,
            &[("http-referer", APP_REFERER), ("x-title", APP_TITLE)],
            settings.request_timeout_secs,
        )
    }

    /// The `openai` backend.
    pub fn openai(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let key = require_key(settings, "openai")?;
        Self::new(
            "openai",
            "OpenAI",
            settings.openai_base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
            key,
            &[],
            settings.request_timeout_secs,
        )
    }
}

pub(crate) fn require_key<'a>(
    settings: &'a ProviderSettings,
    provider: &str,
) -> Result<&'a str, ConfigError> {
    settings
        .api_key(provider)
        .ok_or_else(|| ConfigError::MissingCredential {
            provider: provider.to_string(),
            env_var: ProviderSettings::key_var(provider),
        })
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(String),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Serialize)]
struct WireImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn to_wire(message: &ChatMessage) -> WireMessage<'_> {
    let has_images = message.images().next().is_some();
    let content = if has_images {
        WireContent::Parts(
            message
                .content
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => WirePart::Text { text },
                    ContentPart::Image(img) => WirePart::ImageUrl {
                        image_url: WireImageUrl {
                            url: img.to_data_uri(),
                            detail: "high",
                        },
                    },
                })
                .collect(),
        )
    } else {
        WireContent::Text(message.text())
    };
    WireMessage {
        role: message.role,
        content,
    }
}

/// Turn a raw HTTP status and body into a [`ChatResponse`] or a
/// [`ProviderError`].
pub(crate) fn normalize_response(
    provider: &str,
    label: &str,
    model: &str,
    status: u16,
    body: &str,
) -> Result<ChatResponse, ProviderError> {
    let fail = |message: String| ProviderError::new(provider, model, message).with_status(status);

    if !(200..300).contains(&status) {
        return Err(fail(format!(
            "{label} request failed with status {status}: {body}"
        )));
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| fail(format!("Invalid JSON in {label} response")))?;
    let parsed: CompletionResponse = serde_json::from_value(value)
        .map_err(|_| fail(format!("Unexpected {label} response structure")))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| fail(format!("Unexpected {label} response structure")))?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse { content, usage })
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let request = CompletionRequest {
            model,
            messages: messages.iter().map(to_wire).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("{} request timed out after {}s", self.label, self.timeout_secs)
                } else {
                    format!("{} request failed: {e}", self.label)
                };
                warn!(provider = %self.name, model, "{message}");
                ProviderError::new(&self.name, model, message)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ProviderError::new(
                &self.name,
                model,
                format!("{} response body unreadable: {e}", self.label),
            )
            .with_status(status)
        })?;

        let result = normalize_response(&self.name, self.label, model, status, &body);
        debug!(
            provider = %self.name,
            model,
            status,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion finished"
        );
        result
    }
}
