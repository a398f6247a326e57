//! Anthropic Messages API backend.
//!
//! System messages are lifted into the top-level `system` field; images are
//! sent as base64 `source` blocks rather than data URIs.

use super::openai::require_key;
use super::{ChatMessage, ChatOptions, ChatProvider, ChatResponse, ContentPart, Role, TokenUsage};
use crate::config::{ProviderSettings, ANTHROPIC_BASE_URL};
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
    client: Client,
    timeout_secs: u64,
}

impl AnthropicProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let key = require_key(settings, "anthropic")?;
        let client_error = |detail: String| ConfigError::HttpClient {
            provider: "anthropic".into(),
            detail,
        };

        let mut headers = HeaderMap::new();
        let mut api_key =
            HeaderValue::from_str(key).map_err(|e| client_error(format!("invalid API key: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| client_error(e.to_string()))?;

        Ok(Self {
            base_url: settings
                .anthropic_base_url
                .as_deref()
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client,
            timeout_secs: settings.request_timeout_secs,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Vec<Block<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Block<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn build_request<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    options: &ChatOptions,
) -> MessagesRequest<'a> {
    let system: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(ChatMessage::text)
        .collect();

    let wire = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| WireMessage {
            role: m.role,
            content: m
                .content
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => Block::Text { text },
                    ContentPart::Image(img) => Block::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: &img.mime_type,
                            data: &img.data,
                        },
                    },
                })
                .collect(),
        })
        .collect();

    MessagesRequest {
        model,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: wire,
    }
}

pub(crate) fn normalize_response(
    model: &str,
    status: u16,
    body: &str,
) -> Result<ChatResponse, ProviderError> {
    let fail = |message: String| ProviderError::new("anthropic", model, message).with_status(status);

    if !(200..300).contains(&status) {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        return Err(fail(format!(
            "Anthropic request failed with status {status}: {detail}"
        )));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|_| fail("Invalid JSON in Anthropic response".into()))?;
    let parsed: MessagesResponse = serde_json::from_value(value)
        .map_err(|_| fail("Unexpected Anthropic response structure".into()))?;

    let content = parsed
        .content
        .into_iter()
        .find(|b| b.block_type == "text")
        .and_then(|b| b.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| fail("Unexpected Anthropic response structure".into()))?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse { content, usage })
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let request = build_request(model, messages, options);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("Anthropic request timed out after {}s", self.timeout_secs)
                } else {
                    format!("Anthropic request failed: {e}")
                };
                warn!(model, "{message}");
                ProviderError::new("anthropic", model, message)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ProviderError::new("anthropic", model, format!("Anthropic response body unreadable: {e}"))
                .with_status(status)
        })?;

        debug!(model, status, bytes = body.len(), "Anthropic response received");
        normalize_response(model, status, &body)
    }
}
