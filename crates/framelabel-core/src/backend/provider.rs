//! Backend trait, request type, and the factory that builds a backend from config.

use crate::config::Config;
use crate::error::{ConfigError, ModelCallError};
use crate::fetch::ImagePayload;
use crate::response_log::ResponseSink;
use crate::types::{BackendKind, Labeling};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A request to label one image.
#[derive(Debug, Clone)]
pub struct LabelRequest {
    /// Text prompt for the model
    pub prompt: String,
    /// The image, base64-encoded
    pub image: ImagePayload,
    /// Where the image came from (URL, path, upload name); for logging only
    pub image_source: String,
}

/// Trait that every vision-language backend implements.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn VisionBackend>` for dynamic dispatch).
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Which backend variant this is.
    fn kind(&self) -> BackendKind;

    /// Model variant sent to the vendor.
    fn model(&self) -> &str;

    /// Produce a label and token usage for one image.
    async fn label(&self, request: &LabelRequest) -> Result<Labeling, ModelCallError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Vendor API keys, resolved once when the application starts.
#[derive(Clone, Default)]
pub struct ApiKeys {
    openai: Option<String>,
    gemini: Option<String>,
    events: Option<String>,
}

impl ApiKeys {
    /// Resolve the backend keys and the event source secret.
    pub fn resolve(config: &Config) -> Self {
        Self {
            openai: resolve_env_var(&config.llm.openai.api_key),
            gemini: resolve_env_var(&config.llm.gemini.api_key),
            events: resolve_env_var(&config.events.api_key),
        }
    }

    /// Secret header value for the event source, if any.
    pub fn events(&self) -> Option<&str> {
        self.events.as_deref()
    }

    pub fn get(&self, kind: BackendKind) -> Option<&str> {
        match kind {
            BackendKind::Gpt => self.openai.as_deref(),
            BackendKind::Gemini => self.gemini.as_deref(),
        }
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.is_some())
            .field("gemini", &self.gemini.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

/// Builds the backend selected by a [`BackendKind`].
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend from the `[llm]` config section.
    ///
    /// # Arguments
    /// * `kind` - Which backend to build
    /// * `config` - The full configuration
    /// * `keys` - API keys resolved at startup
    /// * `model_override` - Optional model name that overrides the config default
    /// * `client` - Shared HTTP client
    /// * `sink` - Response log; Gemini always records, GPT only when
    ///   `response_log.log_gpt_calls` is set
    pub fn create(
        kind: BackendKind,
        config: &Config,
        keys: &ApiKeys,
        model_override: Option<&str>,
        client: reqwest::Client,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Arc<dyn VisionBackend>, ConfigError> {
        let timeout = Duration::from_millis(config.limits.http_timeout_ms);
        match kind {
            BackendKind::Gpt => {
                let cfg = &config.llm.openai;
                let api_key = keys.get(kind).ok_or(ConfigError::MissingApiKey {
                    backend: kind,
                    env_hint: "OPENAI_API_KEY",
                })?;
                let model = model_override.unwrap_or(cfg.model.as_str());
                let sink = config.response_log.log_gpt_calls.then_some(sink);
                Ok(Arc::new(super::openai::OpenAiBackend::new(
                    client,
                    &cfg.endpoint,
                    api_key,
                    model,
                    cfg.max_tokens,
                    timeout,
                    sink,
                )))
            }
            BackendKind::Gemini => {
                let cfg = &config.llm.gemini;
                let api_key = keys.get(kind).ok_or(ConfigError::MissingApiKey {
                    backend: kind,
                    env_hint: "GEMINI_API_KEY",
                })?;
                let model = model_override.unwrap_or(cfg.model.as_str());
                Ok(Arc::new(super::gemini::GeminiBackend::new(
                    client,
                    &cfg.endpoint,
                    api_key,
                    model,
                    cfg.max_tokens,
                    timeout,
                    sink,
                )))
            }
        }
    }
}
