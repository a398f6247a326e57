//! LLM provider abstraction.
//!
//! Every model call in the crate goes through [`ChatProvider::chat`]: a list
//! of messages in, the first completion's text plus token usage out. Each
//! backend is responsible for normalising its own failure modes into a
//! single [`ProviderError`], so the orchestrator never sees transport errors.
//!
//! [`ProviderRegistry`] maps provider names to constructors and caches one
//! instance per name. Construction is lazy: a provider whose key is missing
//! only fails when a chain actually reaches it.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;

use crate::config::ProviderSettings;
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A base64-encoded image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// `data:` URI form used by OpenAI-compatible APIs.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImageData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    /// A user turn with an instruction followed by images in order.
    pub fn user_with_images(text: impl Into<String>, images: Vec<ImageData>) -> Self {
        let mut content = Vec::with_capacity(images.len() + 1);
        content.push(ContentPart::Text(text.into()));
        content.extend(images.into_iter().map(ContentPart::Image));
        Self {
            role: Role::User,
            content,
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageData> {
        self.content.iter().filter_map(|p| match p {
            ContentPart::Image(img) => Some(img),
            ContentPart::Text(_) => None,
        })
    }
}

/// Sampling options shared by every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Registry name, e.g. `openrouter`.
    fn name(&self) -> &str;

    /// Send `messages` to `model` and return the first completion.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError>;
}

type Constructor = Arc<dyn Fn() -> Result<Arc<dyn ChatProvider>, ConfigError> + Send + Sync>;

/// Name → constructor map with a per-name singleton cache.
///
/// Two tasks resolving the same uncached name at once may both construct an
/// instance; the first one stored is kept and handed to both.
pub struct ProviderRegistry {
    constructors: RwLock<HashMap<String, Constructor>>,
    cache: RwLock<HashMap<String, Arc<dyn ChatProvider>>>,
}

static GLOBAL: Lazy<Arc<ProviderRegistry>> =
    Lazy::new(|| Arc::new(ProviderRegistry::from_settings(ProviderSettings::from_env())));

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the built-in `openrouter`, `openai` and `anthropic`
    /// backends configured from `settings`.
    pub fn from_settings(settings: ProviderSettings) -> Self {
        let registry = Self::new();

        let s = settings.clone();
        registry.register("openrouter", move || {
            Ok(Arc::new(OpenAiCompatibleProvider::openrouter(&s)?) as Arc<dyn ChatProvider>)
        });
        let s = settings.clone();
        registry.register("openai", move || {
            Ok(Arc::new(OpenAiCompatibleProvider::openai(&s)?) as Arc<dyn ChatProvider>)
        });
        registry.register("anthropic", move || {
            Ok(Arc::new(AnthropicProvider::from_settings(&settings)?) as Arc<dyn ChatProvider>)
        });

        registry
    }

    /// Process-wide registry configured from the environment.
    pub fn global() -> Arc<ProviderRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register (or replace) a constructor. Any cached instance is dropped.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn ChatProvider>, ConfigError> + Send + Sync + 'static,
    {
        let name = name.into();
        write(&self.cache).remove(&name);
        write(&self.constructors).insert(name, Arc::new(constructor));
    }

    /// Register an already constructed provider under its own name.
    pub fn register_instance(&self, provider: Arc<dyn ChatProvider>) {
        let name = provider.name().to_string();
        self.register(name, move || Ok(Arc::clone(&provider)));
    }

    /// Return the cached instance for `name`, constructing it on first use.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ChatProvider>, ConfigError> {
        if let Some(p) = read(&self.cache).get(name) {
            return Ok(Arc::clone(p));
        }

        let constructor = read(&self.constructors).get(name).cloned().ok_or_else(|| {
            ConfigError::UnregisteredProvider {
                provider: name.to_string(),
            }
        })?;
        let provider = constructor()?;
        debug!(provider = name, "Constructed provider");

        let mut cache = write(&self.cache);
        Ok(Arc::clone(cache.entry(name.to_string()).or_insert(provider)))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.constructors).keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every cached instance; constructors stay registered.
    pub fn reset(&self) {
        write(&self.cache).clear();
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// A poisoned lock only means another thread panicked mid-insert; the maps
// are still structurally valid.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl ChatProvider for Echo {
        fn name(&self) -> &str {
            "openai"
        }

        async fn chat(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: messages.last().map(|m| m.text()).unwrap_or_default(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[test]
    fn resolve_caches_one_instance_per_name() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new();
        let counter = Arc::clone(&built);
        registry.register("openai", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Echo) as Arc<dyn ChatProvider>)
        });

        let a = registry.resolve("openai").unwrap();
        let b = registry.resolve("openai").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        registry.reset();
        let c = registry.resolve("openai").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregistered_name_fails_at_resolution() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("mistral").err().unwrap();
        assert_eq!(
            err,
            ConfigError::UnregisteredProvider {
                provider: "mistral".into()
            }
        );
    }

    #[test]
    fn builtins_are_registered_but_need_keys() {
        let registry = ProviderRegistry::from_settings(ProviderSettings::default());
        assert_eq!(registry.names(), vec!["anthropic", "openai", "openrouter"]);
        let err = registry.resolve("openrouter").err().unwrap();
        assert!(matches!(err, ConfigError::MissingCredential { ref env_var, .. } if env_var == "OPENROUTER_API_KEY"));
    }

    #[test]
    fn builtins_construct_with_keys() {
        let settings = ProviderSettings {
            openrouter_api_key: Some("sk-or".into()),
            anthropic_api_key: Some("sk-ant".into()),
            ..ProviderSettings::default()
        };
        let registry = ProviderRegistry::from_settings(settings);
        assert_eq!(registry.resolve("openrouter").unwrap().name(), "openrouter");
        assert_eq!(registry.resolve("anthropic").unwrap().name(), "anthropic");
    }

    #[test]
    fn register_instance_uses_provider_name() {
        let registry = ProviderRegistry::new();
        registry.register_instance(Arc::new(Echo));
        assert_eq!(registry.names(), vec!["openai"]);
    }

    #[test]
    fn user_with_images_keeps_order() {
        let msg = ChatMessage::user_with_images(
            "read this",
            vec![ImageData::new("AAA", "image/png"), ImageData::new("BBB", "image/png")],
        );
        assert_eq!(msg.content.len(), 3);
        assert_eq!(msg.text(), "read this");
        let data: Vec<&str> = msg.images().map(|i| i.data.as_str()).collect();
        assert_eq!(data, vec!["AAA", "BBB"]);
        assert_eq!(
            msg.images().next().unwrap().to_data_uri(),
            "data:image/png;base64,AAA"
        );
    }

    #[tokio::test]
    async fn trait_object_is_callable() {
        let p: Arc<dyn ChatProvider> = Arc::new(Echo);
        let r = p
            .chat("m", &[ChatMessage::user("hello")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(r.content, "hello");
    }
}
