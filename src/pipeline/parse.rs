//! Structured extraction: ask a model for resume JSON and validate it.

use super::resolve_provider;
use crate::error::ProviderError;
use crate::model_chain::ModelRef;
use crate::prompts::build_parse_messages;
use crate::provider::{ChatOptions, ProviderRegistry, TokenUsage};
use crate::resume::ResumeData;
use crate::validate::validate_llm_response;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one parse attempt.
///
/// `success` implies `data` is set and `validation_errors` is empty; the
/// reverse holds on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredExtractionResult {
    pub success: bool,
    pub data: Option<ResumeData>,
    pub validation_errors: Vec<String>,
    /// Model output as received; empty when the call itself failed.
    pub raw_response: String,
    pub usage: TokenUsage,
}

impl StructuredExtractionResult {
    /// Result standing in for a call that never produced a response.
    pub fn from_provider_error(err: &ProviderError) -> Self {
        Self {
            success: false,
            data: None,
            validation_errors: vec![err.to_string()],
            raw_response: String::new(),
            usage: TokenUsage::default(),
        }
    }
}

/// Parse `text` with `model`.
///
/// Validation failures are a normal `Ok` result with `success == false`;
/// `Err` means the provider could not be reached or gave no usable reply.
pub async fn extract_structured(
    registry: &ProviderRegistry,
    text: &str,
    model: &ModelRef,
    options: &ChatOptions,
) -> Result<StructuredExtractionResult, ProviderError> {
    let provider = resolve_provider(registry, model)?;
    let messages = build_parse_messages(text);

    info!(model = %model, text_length = text.chars().count(), "Parse request");
    let start = Instant::now();
    let response = provider.chat(&model.model, &messages, options).await?;
    let latency_ms = start.elapsed().as_millis() as u64;

    let validation = validate_llm_response(&response.content);
    if validation.success {
        info!(
            model = %model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            latency_ms,
            "Parse response valid"
        );
    } else {
        warn!(
            model = %model,
            errors = validation.errors.len(),
            first_error = validation.errors.first().map(String::as_str).unwrap_or_default(),
            latency_ms,
            "Parse response failed validation"
        );
    }

    Ok(StructuredExtractionResult {
        success: validation.success,
        data: validation.data,
        validation_errors: validation.errors,
        raw_response: response.content,
        usage: response.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, ChatProvider, ChatResponse, Role};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Canned {
        reply: Result<&'static str, &'static str>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl Canned {
        fn new(reply: Result<&'static str, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for Canned {
        fn name(&self) -> &str {
            "openai"
        }

        async fn chat(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match self.reply {
                Ok(content) => Ok(ChatResponse {
                    content: content.into(),
                    usage: TokenUsage {
                        input_tokens: 900,
                        output_tokens: 120,
                    },
                }),
                Err(msg) => Err(ProviderError::new("openai", model, msg).with_status(500)),
            }
        }
    }

    fn registry_with(p: Arc<Canned>) -> ProviderRegistry {
        let r = ProviderRegistry::new();
        r.register_instance(p);
        r
    }

    fn model() -> ModelRef {
        ModelRef::new("openai", "gpt-4o-mini")
    }

    #[tokio::test]
    async fn valid_json_succeeds() {
        let p = Canned::new(Ok(r#"{"personal_info":{"name":"John Doe"},"skills":[{"skill":"Python"}]}"#));
        let r = extract_structured(&registry_with(Arc::clone(&p)), "John Doe\nPython", &model(), &ChatOptions::default())
            .await
            .unwrap();
        assert!(r.success);
        assert!(r.validation_errors.is_empty());
        assert_eq!(r.data.unwrap().skills[0].skill, "Python");
        assert_eq!(r.usage.output_tokens, 120);

        let seen = p.seen.lock().unwrap();
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[1].text().ends_with("John Doe\nPython"));
    }

    #[tokio::test]
    async fn invalid_json_is_ok_but_unsuccessful() {
        let p = Canned::new(Ok("I could not parse this resume."));
        let r = extract_structured(&registry_with(p), "x", &model(), &ChatOptions::default())
            .await
            .unwrap();
        assert!(!r.success);
        assert!(r.data.is_none());
        assert_eq!(r.validation_errors.len(), 1);
        assert_eq!(r.raw_response, "I could not parse this resume.");
    }

    #[tokio::test]
    async fn provider_failure_is_err() {
        let p = Canned::new(Err("boom"));
        let err = extract_structured(&registry_with(p), "x", &model(), &ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(500));

        let stand_in = StructuredExtractionResult::from_provider_error(&err);
        assert_eq!(stand_in.validation_errors, vec!["openai/gpt-4o-mini: boom"]);
        assert_eq!(stand_in.usage, TokenUsage::default());
    }
}
