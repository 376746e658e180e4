//! GPT backend using the OpenAI Chat Completions API.
//!
//! Sends the image as a data URL in the user message content array. Usage
//! counts returned by the vendor are trusted as-is.

use super::provider::{LabelRequest, VisionBackend};
use super::tokens;
use crate::error::ModelCallError;
use crate::response_log::{redacted_excerpt, LogEntry, LogMetadata, ResponseSink};
use crate::types::{BackendKind, Labeling, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// GPT backend using the Chat Completions API.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    sink: Option<Arc<dyn ResponseSink>>,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
        sink: Option<Arc<dyn ResponseSink>>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            timeout,
            sink,
        }
    }

    async fn call(
        &self,
        request: &LabelRequest,
        raw: &mut Option<Value>,
    ) -> Result<Labeling, ModelCallError> {
        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::Text {
                        text: request.prompt.clone(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.data_url(),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelCallError::new(BackendKind::Gpt, format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            ModelCallError::new(BackendKind::Gpt, format!("failed to read response: {e}"))
        })?;
        *raw = Some(serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone())));

        if !status.is_success() {
            return Err(ModelCallError::with_status(
                BackendKind::Gpt,
                status.as_u16(),
                format!("HTTP {status}: {}", redacted_excerpt(&text)),
            ));
        }

        let chat_resp: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            ModelCallError::new(BackendKind::Gpt, format!("failed to parse response: {e}"))
        })?;

        let label = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ModelCallError::new(BackendKind::Gpt, "empty choices: no content generated")
            })?
            .to_string();

        let actual = chat_resp.usage.map(|u| {
            let usage = TokenUsage::actual(u.prompt_tokens, u.completion_tokens);
            if u.total_tokens != usage.total {
                tracing::debug!(
                    "OpenAI reported total_tokens={} but prompt+completion={}",
                    u.total_tokens,
                    usage.total
                );
            }
            usage
        });

        Ok(Labeling {
            tokens: tokens::resolve_usage(actual, &request.prompt, &label),
            label,
            model: chat_resp.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpt
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn label(&self, request: &LabelRequest) -> Result<Labeling, ModelCallError> {
        let start = Instant::now();
        let mut raw = None;
        let result = self.call(request, &mut raw).await;

        if let Some(sink) = &self.sink {
            sink.record(LogEntry::new(
                BackendKind::Gpt,
                &self.model,
                &request.prompt,
                &request.image_source,
                raw,
                LogMetadata {
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    tokens: result.as_ref().ok().map(|l| l.tokens),
                },
                result.as_ref().err().map(|e| e.to_string()),
            ));
        }

        result
    }
}
