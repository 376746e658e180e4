//! FrameLabel Core - batch image labeling with vision-language models.
//!
//! Takes a list of images (remote URLs, local files, or in-memory uploads)
//! and a prompt, sends each image to one of two interchangeable backends,
//! and returns a per-image label with token accounting.
//!
//! # Architecture
//!
//! ```text
//! ImageTask[] → chunk → Fetch → VisionBackend → ProcessingResult → BatchSummary
//!                                     ↓
//!                               ResponseSink (audit log)
//! ```
//!
//! The summary can be rendered with [`export`] and priced up front with [`cost`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use framelabel_core::{BackendKind, Config, FrameLabel, ImageTask};
//!
//! #[tokio::main]
//! async fn main() -> framelabel_core::Result<()> {
//!     let app = FrameLabel::new(Config::load()?)?;
//!     let processor = app.processor(BackendKind::Gemini, None)?;
//!
//!     let tasks = ImageTask::from_refs(&["https://cdn.example.com/cam/1.jpg"]);
//!     let summary = processor.process(&tasks, "Who is at the door?", None).await;
//!     println!("{} labeled, {} tokens", summary.processed_count, summary.total_tokens);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod batch;
pub mod config;
pub mod cost;
pub mod error;
pub mod events;
pub mod export;
pub mod fetch;
pub mod response_log;
pub mod types;

pub use backend::{ApiKeys, BackendFactory, LabelRequest, VisionBackend};
pub use batch::{BatchOptions, BatchProcessor, ChunkProgress};
pub use config::Config;
pub use cost::{CostEstimate, RateTable};
pub use error::{
    ConfigError, EventSourceError, FetchError, FrameLabelError, ItemError, LogError,
    ModelCallError, Result, ValidationError,
};
pub use events::{EventPage, EventSourceClient};
pub use export::{ApiType, ExportFormat};
pub use fetch::ImageFetcher;
pub use response_log::{FileResponseLog, LogEntry, ResponseSink};
pub use types::{
    BackendKind, BatchSummary, ImageSource, ImageTask, ProcessingResult, ResultEntry, TokenUsage,
};

use std::sync::Arc;
use std::time::Duration;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point holding the configuration and the shared clients.
///
/// One HTTP client and one response sink are created here and handed to
/// every component built from this instance. Secrets are resolved from the
/// environment once, at construction.
pub struct FrameLabel {
    config: Config,
    keys: ApiKeys,
    client: reqwest::Client,
    sink: Arc<dyn ResponseSink>,
}

impl FrameLabel {
    /// Create a new instance with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        let sink = response_log::sink_from_config(&config);
        Self::with_sink(config, sink)
    }

    /// Create an instance that records backend calls to `sink`.
    pub fn with_sink(config: Config, sink: Arc<dyn ResponseSink>) -> Result<Self> {
        tracing::debug!("Initializing FrameLabel v{}", VERSION);
        let client = reqwest::Client::builder()
            .user_agent(concat!("framelabel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("HTTP client: {e}")))?;
        Ok(Self {
            keys: ApiKeys::resolve(&config),
            config,
            client,
            sink,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn ResponseSink> {
        &self.sink
    }

    /// Build a batch processor for `kind`, optionally overriding the model.
    pub fn processor(&self, kind: BackendKind, model: Option<&str>) -> Result<BatchProcessor> {
        Ok(BatchProcessor::from_config(
            &self.config,
            &self.keys,
            kind,
            model,
            self.client.clone(),
            self.sink.clone(),
        )?)
    }

    /// Client for the configured image source API.
    pub fn events(&self) -> Result<EventSourceClient> {
        Ok(EventSourceClient::with_api_key(
            &self.config.events,
            self.keys.events().map(str::to_string),
            self.client.clone(),
            Duration::from_millis(self.config.limits.http_timeout_ms),
        )?)
    }

    /// Rate table including configured overrides.
    pub fn rates(&self) -> RateTable {
        RateTable::new(self.config.pricing.clone())
    }

    /// File-backed view of the response log directory.
    pub fn response_log(&self) -> FileResponseLog {
        FileResponseLog::new(self.config.response_log_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response_log::NullResponseLog;

    #[test]
    fn test_processor_requires_key_for_selected_backend_only() {
        let mut config = Config::default();
        config.llm.openai.api_key = "sk-test".to_string();
        config.llm.gemini.api_key = String::new();
        let app = FrameLabel::with_sink(config, Arc::new(NullResponseLog)).unwrap();

        let processor = app.processor(BackendKind::Gpt, None).unwrap();
        assert_eq!(processor.backend().model(), "gpt-4o-mini");
        assert_eq!(processor.options().batch_size, 10);

        let err = app.processor(BackendKind::Gemini, None).err().unwrap();
        assert!(matches!(err, FrameLabelError::Config(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_events_requires_endpoint() {
        let app = FrameLabel::with_sink(Config::default(), Arc::new(NullResponseLog)).unwrap();
        assert!(matches!(
            app.events().err().unwrap(),
            FrameLabelError::Events(EventSourceError::NotConfigured)
        ));
    }

    #[test]
    fn test_secrets_resolved_at_construction() {
        std::env::set_var("FRAMELABEL_TEST_OPENAI_KEY_STARTUP", "sk-startup");
        let mut config = Config::default();
        config.llm.openai.api_key = "${FRAMELABEL_TEST_OPENAI_KEY_STARTUP}".to_string();
        let app = FrameLabel::with_sink(config, Arc::new(NullResponseLog)).unwrap();
        std::env::remove_var("FRAMELABEL_TEST_OPENAI_KEY_STARTUP");

        // Later environment changes do not affect an existing instance.
        assert!(app.processor(BackendKind::Gpt, None).is_ok());
        assert!(app.processor(BackendKind::Gpt, Some("gpt-4o")).is_ok());
    }
}
