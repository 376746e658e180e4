//! Error types for the framelabel labeling pipeline.
//!
//! Errors are organized by stage. Only configuration and validation errors
//! ever reach the caller of a batch: fetch and model errors are recorded on the
//! failing item, and logging errors are swallowed by the sink that raised them.

use crate::types::BackendKind;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for framelabel operations.
#[derive(Error, Debug)]
pub enum FrameLabelError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Missing or malformed caller input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Image source API errors
    #[error("Event source error: {0}")]
    Events(#[from] EventSourceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A backend was selected whose API key is not set
    #[error("{backend} API key not set. Set {env_hint} env var.")]
    MissingApiKey {
        backend: BackendKind,
        env_hint: &'static str,
    },
}

/// Required input is missing. Raised before any network call is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("No images provided")]
    NoImages,

    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Selected index {index} is out of range for {len} images")]
    SelectionOutOfRange { index: usize, len: usize },
}

/// Image retrieval failed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The image host answered with a non-2xx status
    #[error("Image fetch failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The image host could not be reached
    #[error("Image fetch failed: {cause}")]
    Network { cause: String },

    /// A local image file could not be read
    #[error("Failed to read image {path:?}: {cause}")]
    Read { path: PathBuf, cause: String },
}

/// A vision-language backend rejected the call or was unreachable.
#[derive(Error, Debug, Clone)]
#[error("{backend} call failed: {message}")]
pub struct ModelCallError {
    pub backend: BackendKind,
    pub message: String,
    /// HTTP status from the vendor, when one was received
    pub status_code: Option<u16>,
}

impl ModelCallError {
    pub fn new(backend: BackendKind, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(backend: BackendKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
            status_code: Some(status),
        }
    }
}

/// Per-item failure: either the image could not be fetched or the model call failed.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Model(#[from] ModelCallError),
}

/// Camera image source API errors.
#[derive(Error, Debug)]
pub enum EventSourceError {
    #[error("Event source endpoint is not configured")]
    NotConfigured,

    #[error("Page {page} is out of range for page base {page_base}")]
    PageOutOfRange { page: u32, page_base: u32 },

    #[error("Event source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Event source request failed: {0}")]
    Network(String),

    #[error("Unexpected event source payload: {0}")]
    Payload(String),
}

/// Response log write/read failures. Sinks catch these on the record path.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid log filename: {0}")]
    InvalidFilename(String),

    #[error("Log file not found: {0}")]
    NotFound(String),

    #[error("Log task failed: {0}")]
    Task(String),
}

/// Convenience type alias for framelabel results.
pub type Result<T> = std::result::Result<T, FrameLabelError>;
