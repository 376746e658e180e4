//! Client for the camera image source API.
//!
//! One call fetches one page. The endpoint answers
//! `{"data": {"data": [...], "total": N, "totalPages": M}}` where each item is
//! either an image URL or an event object with an `image` field. Callers
//! always count pages from zero; the configured `page_base` is added here.

use crate::backend::resolve_env_var;
use crate::config::EventsConfig;
use crate::error::EventSourceError;
use crate::response_log::redacted_excerpt;
use crate::types::{ImageSource, ImageTask};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One page of images from the event source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    /// Zero-based page number as requested by the caller
    pub page: u32,
    pub tasks: Vec<ImageTask>,
    /// Raw event records, in the same order as `tasks`
    pub events: Vec<Value>,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Deserialize)]
struct Envelope {
    data: PageBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageBody {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    total_pages: u64,
}

/// Paginated image source client.
pub struct EventSourceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_header: String,
    page_base: u32,
    page_size: u32,
    timeout: Duration,
}

impl EventSourceClient {
    /// Build a client, resolving the secret from `config.api_key`.
    pub fn new(
        config: &EventsConfig,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, EventSourceError> {
        Self::with_api_key(config, resolve_env_var(&config.api_key), client, timeout)
    }

    /// Build a client with an already-resolved secret.
    pub fn with_api_key(
        config: &EventsConfig,
        api_key: Option<String>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, EventSourceError> {
        if config.endpoint.trim().is_empty() {
            return Err(EventSourceError::NotConfigured);
        }
        if api_key.is_none() {
            tracing::warn!("Event source API key is not set; requesting without it");
        }
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            api_key,
            api_key_header: config.api_key_header.clone(),
            page_base: config.page_base,
            page_size: config.page_size,
            timeout,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch zero-based `page` and normalize its items into tasks.
    pub async fn fetch_page(&self, page: u32) -> Result<EventPage, EventSourceError> {
        let wire_page = page
            .checked_add(self.page_base)
            .ok_or(EventSourceError::PageOutOfRange {
                page,
                page_base: self.page_base,
            })?;
        tracing::debug!("Fetching events page {page} (wire page {wire_page})");

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("page", wire_page), ("limit", self.page_size)])
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.header(self.api_key_header.as_str(), key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EventSourceError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EventSourceError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(EventSourceError::Status {
                status: status.as_u16(),
                body: redacted_excerpt(&text),
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| EventSourceError::Payload(e.to_string()))?;
        parse_page(value, page, self.page_size)
    }
}

/// Normalize a page payload.
///
/// Items without a usable image reference are skipped; `original_index`
/// stays the item's position in the page. Serial numbers default to the
/// row number across pages.
pub fn parse_page(value: Value, page: u32, page_size: u32) -> Result<EventPage, EventSourceError> {
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| EventSourceError::Payload(e.to_string()))?;
    let body = envelope.data;
    let offset = page as i64 * page_size as i64;

    let mut tasks = Vec::with_capacity(body.data.len());
    let mut events = Vec::with_capacity(body.data.len());
    for (index, item) in body.data.into_iter().enumerate() {
        let Some(task) = task_from_value(&item, index, offset + index as i64 + 1) else {
            tracing::warn!("Skipping event {index} on page {page}: no image reference");
            continue;
        };
        tasks.push(task);
        events.push(item);
    }

    Ok(EventPage {
        page,
        tasks,
        events,
        total: body.total,
        total_pages: body.total_pages,
    })
}

/// Build a task from a URL string or an object with an `image` field.
///
/// `fallback_serial` is used when the object carries no numeric serial.
pub fn task_from_value(item: &Value, index: usize, fallback_serial: i64) -> Option<ImageTask> {
    let image = image_ref(item)?;
    let serial = serial_number(item).unwrap_or(fallback_serial);
    Some(ImageTask::new(ImageSource::parse(image), index).with_serial_number(serial))
}

fn image_ref(item: &Value) -> Option<&str> {
    let image = match item {
        Value::String(url) => Some(url.as_str()),
        Value::Object(map) => map.get("image").and_then(Value::as_str),
        _ => None,
    };
    image.filter(|s| !s.trim().is_empty())
}

fn serial_number(item: &Value) -> Option<i64> {
    let map = item.as_object()?;
    ["serialNumber", "serial_number", "serial"]
        .iter()
        .find_map(|key| match map.get(*key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}
