//! Side-channel audit trail of backend calls.
//!
//! Every vision-language call is described by a [`LogEntry`] and handed to a
//! [`ResponseSink`]. Recording is fire-and-forget: sinks swallow their own
//! failures with a local warning so the labeling pipeline never sees them.
//! Embedded image payloads are redacted before an entry is ever built.

mod file;
mod memory;

pub use file::{FileResponseLog, LogFileInfo};
pub use memory::MemoryResponseLog;

use crate::config::Config;
use crate::types::{BackendKind, TokenUsage};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Replacement for anything that looks like an embedded binary payload.
pub const REDACTED: &str = "[BASE64_IMAGE_DATA_REMOVED]";

/// Strings longer than this made only of base64 characters are redacted.
const BASE64_MIN_LEN: usize = 100;

/// Image source tags longer than this are truncated in log entries.
const IMAGE_SOURCE_MAX_LEN: usize = 100;

/// Vendor error bodies are cut to this many characters in error messages.
const ERROR_BODY_MAX_LEN: usize = 500;

/// Timing and token figures for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    pub processing_time_ms: u64,
    /// Token usage, tagged with whether it was estimated or vendor-reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

/// One record per backend call. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub backend: BackendKind,
    /// Model variant, e.g. "gemini-1.5-flash"
    pub model: String,
    pub prompt: String,
    pub image_source_truncated: String,
    pub response: Option<Value>,
    pub metadata: LogMetadata,
    pub error: Option<String>,
}

impl LogEntry {
    /// Build an entry stamped with the current UTC time and a fresh request id.
    ///
    /// The response is redacted here, so every sink sees the same safe payload.
    pub fn new(
        backend: BackendKind,
        model: &str,
        prompt: &str,
        image_source: &str,
        response: Option<Value>,
        metadata: LogMetadata,
        error: Option<String>,
    ) -> Self {
        let response = response.map(|mut value| {
            redact(&mut value);
            value
        });
        Self {
            timestamp: Utc::now(),
            request_id: new_request_id(),
            backend,
            model: model.to_string(),
            prompt: prompt.to_string(),
            image_source_truncated: truncate(image_source, IMAGE_SOURCE_MAX_LEN),
            response,
            metadata,
            error,
        }
    }
}

/// Destination for backend call records.
pub trait ResponseSink: Send + Sync {
    /// Record one call. Must not panic and must not propagate failures.
    fn record(&self, entry: LogEntry);
}

/// Discards every record. Used when the response log is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResponseLog;

impl ResponseSink for NullResponseLog {
    fn record(&self, _entry: LogEntry) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingResponseLog;

impl ResponseSink for TracingResponseLog {
    fn record(&self, entry: LogEntry) {
        let tokens_total = entry.metadata.tokens.map(|t| t.total).unwrap_or(0);
        match &entry.error {
            Some(error) => tracing::warn!(
                target: "framelabel::response_log",
                request_id = %entry.request_id,
                backend = %entry.backend,
                model = %entry.model,
                image = %entry.image_source_truncated,
                processing_time_ms = entry.metadata.processing_time_ms,
                error = %error,
                "backend call failed"
            ),
            None => tracing::info!(
                target: "framelabel::response_log",
                request_id = %entry.request_id,
                backend = %entry.backend,
                model = %entry.model,
                image = %entry.image_source_truncated,
                processing_time_ms = entry.metadata.processing_time_ms,
                tokens_total,
                "backend call recorded"
            ),
        }
    }
}

/// Build the sink described by the `[response_log]` config section.
pub fn sink_from_config(config: &Config) -> Arc<dyn ResponseSink> {
    if !config.response_log.enabled {
        return Arc::new(NullResponseLog);
    }
    match config.response_log.sink.as_str() {
        "tracing" => Arc::new(TracingResponseLog),
        _ => Arc::new(FileResponseLog::new(config.response_log_dir())),
    }
}

/// Replace embedded binary payloads with [`REDACTED`], recursively.
///
/// A string is redacted when its key is `data` or mentions `base64`, when it
/// is a `data:` URI carrying base64, or when it is a long run of base64
/// characters.
pub fn redact(value: &mut Value) {
    redact_value(value, None);
}

/// Redacted, length-capped rendering of a raw vendor response body, for
/// error messages that end up in logs.
pub fn redacted_excerpt(body: &str) -> String {
    let mut value = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
    redact(&mut value);
    let text = match value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    truncate(&text, ERROR_BODY_MAX_LEN)
}

fn redact_value(value: &mut Value, key: Option<&str>) {
    match value {
        Value::String(s) => {
            if looks_like_payload(key, s) {
                *s = REDACTED.to_string();
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_value(item, None);
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                redact_value(v, Some(k));
            }
        }
        _ => {}
    }
}

fn looks_like_payload(key: Option<&str>, s: &str) -> bool {
    if s == REDACTED {
        return false;
    }
    if let Some(key) = key {
        let key = key.to_lowercase();
        if (key == "data" || key.contains("base64")) && !s.is_empty() {
            return true;
        }
    }
    if s.starts_with("data:") && s.contains(";base64,") {
        return true;
    }
    s.len() > BASE64_MIN_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

fn new_request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
