//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of images dispatched concurrently per chunk
    pub batch_size: usize,

    /// Upper bound on a per-request batch size override
    pub max_batch_size: usize,

    /// Put the underlying failure cause into `detailedError` instead of the
    /// generic message. Only for operator/debug use.
    pub expose_error_details: bool,

    /// Prompt used when the caller does not supply one
    pub default_prompt: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_batch_size: 50,
            expose_error_details: false,
            default_prompt: "Describe what the camera sees in this image in one short sentence. \
                             Mention any people, animals, or vehicles."
                .to_string(),
        }
    }
}

impl BatchConfig {
    /// Cap a caller-supplied batch size at `max_batch_size`.
    pub fn clamp_batch_size(&self, requested: usize) -> usize {
        requested.min(self.max_batch_size)
    }
}

/// Network limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Timeout applied by the HTTP client to vendor model calls
    pub http_timeout_ms: u64,

    /// Timeout applied by the HTTP client to image downloads
    pub fetch_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: 60_000,
            fetch_timeout_ms: 30_000,
        }
    }
}

/// Vision-language backend configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    /// GPT-style chat completions backend
    pub openai: OpenAiConfig,

    /// Gemini generate-content backend
    pub gemini: GeminiConfig,
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,

    /// API base URL (the `/chat/completions` path is appended)
    pub endpoint: String,

    /// Maximum tokens to generate per label
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            max_tokens: 300,
        }
    }
}

/// Gemini configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name, also used as the model variant in response log filenames
    pub model: String,

    /// API base URL (`/models/{model}:generateContent` is appended)
    pub endpoint: String,

    /// Maximum tokens to generate per label
    pub max_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: "${GEMINI_API_KEY}".to_string(),
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_tokens: 300,
        }
    }
}

/// Camera image source API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Full URL of the paginated events endpoint (empty = not configured)
    pub endpoint: String,

    /// Shared secret (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Header carrying the shared secret
    pub api_key_header: String,

    /// Index of the first page on this endpoint variant (0 or 1)
    pub page_base: u32,

    /// Items requested per page
    pub page_size: u32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: "${EVENTS_API_KEY}".to_string(),
            api_key_header: "x-api-key".to_string(),
            page_base: 0,
            page_size: 20,
        }
    }
}

/// Response log (per-call audit trail) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseLogConfig {
    /// Whether backend calls are recorded at all
    pub enabled: bool,

    /// Directory holding one JSON file per call
    pub dir: String,

    /// Also record GPT calls (Gemini calls are always recorded when enabled)
    pub log_gpt_calls: bool,

    /// Where records go: "file" (one JSON file per call) or "tracing"
    pub sink: String,
}

impl Default for ResponseLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "~/.framelabel/logs".to_string(),
            log_gpt_calls: true,
            sink: "file".to_string(),
        }
    }
}

/// Per-model price overrides, keyed by model id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PricingConfig {
    pub models: BTreeMap<String, ModelPricing>,
}

/// Price and per-image token assumptions for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per one million input tokens
    pub input_per_million: f64,

    /// USD per one million output tokens
    pub output_per_million: f64,

    /// Assumed input tokens per image
    pub input_tokens_per_image: u64,

    /// Assumed output tokens per image
    pub output_tokens_per_image: u64,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
