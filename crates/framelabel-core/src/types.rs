//! Core data types for the framelabel pipeline.
//!
//! These types describe one unit of work (`ImageTask`), its recorded outcome
//! (`ProcessingResult`), and the aggregate over a whole invocation (`BatchSummary`).
//! Field names serialize in camelCase to match the dashboard's JSON payloads.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// The vision-language backend used to label an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-style chat completions with a data-URI image
    #[default]
    Gpt,
    /// Gemini generate-content with inline image bytes
    Gemini,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gpt => "gpt",
            BackendKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gpt" | "openai" => Ok(BackendKind::Gpt),
            "gemini" | "google" => Ok(BackendKind::Gemini),
            other => Err(format!("Unknown backend: {other}")),
        }
    }
}

/// Where an image's bytes come from.
///
/// Serializes as a plain string (the URL, the path, or the inline name).
/// Strings starting with `http://` or `https://` deserialize as URLs,
/// anything else as a local file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Remote image fetched over HTTP(S)
    Url(String),
    /// Image file on local disk
    File(PathBuf),
    /// In-memory upload (e.g. a multipart file handle)
    Bytes { name: String, data: Arc<[u8]> },
}

impl ImageSource {
    /// Parse a caller-supplied reference string.
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Url(trimmed.to_string())
        } else {
            ImageSource::File(PathBuf::from(trimmed))
        }
    }

    pub fn bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Human-readable tag used in logs and results.
    pub fn tag(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }
}

impl Serialize for ImageSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

impl<'de> Deserialize<'de> for ImageSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reference = String::deserialize(deserializer)?;
        Ok(ImageSource::parse(&reference))
    }
}

/// One unit of work: a single image at a fixed position in the caller's ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTask {
    pub image_ref: ImageSource,
    pub serial_number: i64,
    pub original_index: usize,
}

impl ImageTask {
    /// Create a task whose serial number is its 1-based row number.
    pub fn new(image_ref: ImageSource, original_index: usize) -> Self {
        Self {
            image_ref,
            serial_number: original_index as i64 + 1,
            original_index,
        }
    }

    pub fn with_serial_number(mut self, serial_number: i64) -> Self {
        self.serial_number = serial_number;
        self
    }

    /// Build tasks from a list of reference strings, indexed in order.
    pub fn from_refs<S: AsRef<str>>(refs: &[S]) -> Vec<Self> {
        refs.iter()
            .enumerate()
            .map(|(i, r)| Self::new(ImageSource::parse(r.as_ref()), i))
            .collect()
    }
}

/// Which source produced a token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// Reported by the vendor's usage metadata
    Actual,
    /// Derived from character counts
    Estimated,
}

/// Token accounting for one backend call.
///
/// `total` is always `prompt + completion`; use the constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TokenSource>,
}

impl TokenUsage {
    pub fn actual(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
            source: Some(TokenSource::Actual),
        }
    }

    pub fn estimated(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
            source: Some(TokenSource::Estimated),
        }
    }

    /// Zero usage, attached to failed items.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// The recorded outcome of labeling one `ImageTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub image_ref: String,
    pub serial_number: i64,
    pub original_index: usize,
    pub label: String,
    pub tokens: TokenUsage,
    pub model_used: BackendKind,
    /// Concrete model variant (e.g. "gemini-1.5-flash"), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub processed: bool,
    pub error: bool,
    pub detailed_error: Option<String>,
}

impl ProcessingResult {
    pub fn success(task: &ImageTask, backend: BackendKind, labeling: Labeling) -> Self {
        Self {
            image_ref: task.image_ref.tag(),
            serial_number: task.serial_number,
            original_index: task.original_index,
            label: labeling.label,
            tokens: labeling.tokens,
            model_used: backend,
            model: Some(labeling.model),
            processed: true,
            error: false,
            detailed_error: None,
        }
    }

    pub fn failure(task: &ImageTask, backend: BackendKind, detailed_error: String) -> Self {
        Self {
            image_ref: task.image_ref.tag(),
            serial_number: task.serial_number,
            original_index: task.original_index,
            label: FAILED_LABEL.to_string(),
            tokens: TokenUsage::zero(),
            model_used: backend,
            model: None,
            processed: true,
            error: true,
            detailed_error: Some(detailed_error),
        }
    }
}

/// Label shown on items whose processing failed.
pub const FAILED_LABEL: &str = "Error processing image";

/// Caller-facing failure text; the real cause only goes to server-side logs.
pub const GENERIC_ERROR: &str = "Something went wrong";

/// A backend's answer for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeling {
    pub label: String,
    pub tokens: TokenUsage,
    /// Model variant that answered
    pub model: String,
}

/// One slot of the final result list.
///
/// Tasks that were not selected for processing pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEntry {
    Processed(ProcessingResult),
    Skipped(ImageTask),
}

impl ResultEntry {
    pub fn as_processed(&self) -> Option<&ProcessingResult> {
        match self {
            ResultEntry::Processed(result) => Some(result),
            ResultEntry::Skipped(_) => None,
        }
    }
}

/// Aggregate over one full pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub results: Vec<ResultEntry>,
    pub processed_count: usize,
    pub error_count: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub model_used: BackendKind,
    /// Set when the whole call was rejected before dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchSummary {
    pub fn empty(model_used: BackendKind) -> Self {
        Self {
            results: Vec::new(),
            processed_count: 0,
            error_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            model_used,
            error: None,
        }
    }

    /// A summary for a call rejected before any dispatch.
    ///
    /// Input tasks are passed through untouched so the caller's list survives.
    pub fn rejected(model_used: BackendKind, tasks: &[ImageTask], reason: String) -> Self {
        Self {
            results: tasks.iter().cloned().map(ResultEntry::Skipped).collect(),
            error: Some(reason),
            ..Self::empty(model_used)
        }
    }

    /// Fold one item's outcome into the running totals.
    ///
    /// Failed items count as errors and contribute no tokens.
    pub fn record(&mut self, result: &ProcessingResult) {
        if result.error {
            self.error_count += 1;
            return;
        }
        self.processed_count += 1;
        self.prompt_tokens += result.tokens.prompt;
        self.completion_tokens += result.tokens.completion;
        self.total_tokens = self.prompt_tokens + self.completion_tokens;
    }

    /// Iterate over processed results only.
    pub fn processed(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter_map(ResultEntry::as_processed)
    }

    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }
}
