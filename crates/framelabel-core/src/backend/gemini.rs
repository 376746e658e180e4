//! Gemini backend using the generateContent API with inline image bytes.
//!
//! Token usage comes from `usageMetadata` when the vendor supplies it and is
//! estimated from character counts otherwise; the result records which.
//! Every call, failed or not, is written to the response log.

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

/// Gemini backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    sink: Arc<dyn ResponseSink>,
}

impl GeminiBackend {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                endpoint.trim_end_matches('/'),
                model
            ),
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
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.media_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        };

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                ModelCallError::new(BackendKind::Gemini, format!("request failed: {e}"))
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            ModelCallError::new(BackendKind::Gemini, format!("failed to read response: {e}"))
        })?;
        *raw = Some(serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone())));

        if !status.is_success() {
            return Err(ModelCallError::with_status(
                BackendKind::Gemini,
                status.as_u16(),
                format!("HTTP {status}: {}", redacted_excerpt(&text)),
            ));
        }

        let generated: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            ModelCallError::new(BackendKind::Gemini, format!("failed to parse response: {e}"))
        })?;

        let label = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
            .trim()
            .to_string();
        if label.is_empty() {
            return Err(ModelCallError::new(
                BackendKind::Gemini,
                "empty response: no text content generated",
            ));
        }

        let actual = generated.usage_metadata.and_then(UsageMetadata::into_usage);
        if actual.is_none() {
            tracing::debug!("Gemini returned no usage metadata; estimating tokens");
        }

        Ok(Labeling {
            tokens: tokens::resolve_usage(actual, &request.prompt, &label),
            label,
            model: generated.model_version.unwrap_or_else(|| self.model.clone()),
        })
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

impl UsageMetadata {
    /// Only a complete reading counts as actual usage.
    fn into_usage(self) -> Option<TokenUsage> {
        Some(TokenUsage::actual(
            self.prompt_token_count?,
            self.candidates_token_count?,
        ))
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn label(&self, request: &LabelRequest) -> Result<Labeling, ModelCallError> {
        let start = Instant::now();
        let mut raw = None;
        let result = self.call(request, &mut raw).await;

        self.sink.record(LogEntry::new(
            BackendKind::Gemini,
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

        result
    }
}
