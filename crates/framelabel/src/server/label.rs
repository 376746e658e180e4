//! `POST /api/label`: run the batch pipeline over a JSON image list.
//!
//! Answers 200 with a `BatchSummary` for every well-formed request; rejected
//! calls carry `error`. An unknown backend or an item without an image
//! reference is a 400, so `selected` and the result list always line up with
//! the caller's `images` positions.

use super::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use framelabel_core::events::task_from_value;
use framelabel_core::{BackendKind, BatchSummary, ImageTask};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelBody {
    /// Image URLs, or event objects with an `image` field
    #[serde(default)]
    pub images: Vec<Value>,
    #[serde(default)]
    pub prompt: String,
    /// `gpt` or `gemini`; defaults to gpt
    pub backend: Option<String>,
    /// Model variant overriding the configured default
    pub model: Option<String>,
    /// Capped at `batch.max_batch_size`
    pub batch_size: Option<usize>,
    /// Positions in `images` to process; all when absent
    pub selected: Option<Vec<usize>>,
}

pub async fn label(
    State(state): State<AppState>,
    Json(body): Json<LabelBody>,
) -> Result<Json<BatchSummary>, ApiError> {
    let kind = match body.backend.as_deref() {
        Some(name) => name.parse::<BackendKind>().map_err(ApiError::BadRequest)?,
        None => BackendKind::default(),
    };

    let tasks = body
        .images
        .iter()
        .enumerate()
        .map(|(i, item)| {
            task_from_value(item, i, i as i64 + 1)
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("images[{i}] has no image reference"))
                })
        })
        .collect::<Result<Vec<ImageTask>, _>>()?;

    let processor = match state.app.processor(kind, body.model.as_deref()) {
        Ok(processor) => processor,
        Err(e) => {
            tracing::error!("Cannot build {kind} backend: {e}");
            return Ok(Json(BatchSummary::rejected(kind, &tasks, e.to_string())));
        }
    };
    let processor = match body.batch_size {
        Some(requested) => {
            let size = state.app.config().batch.clamp_batch_size(requested);
            if size != requested {
                tracing::debug!("Batch size {requested} capped at {size}");
            }
            processor.with_batch_size(size)
        }
        None => processor,
    };

    let summary = processor
        .process(&tasks, &body.prompt, body.selected.as_deref())
        .await;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{body_json, router};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use framelabel_core::Config;
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/label")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_prompt_is_structured_200() {
        let mut config = Config::default();
        config.llm.gemini.api_key = "g-test".to_string();

        let resp = router(config)
            .oneshot(post(json!({
                "images": ["https://cdn.example.com/1.jpg"],
                "backend": "gemini"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Prompt is required");
        assert_eq!(json["processedCount"], 0);
        assert_eq!(json["results"][0]["imageRef"], "https://cdn.example.com/1.jpg");
    }

    #[tokio::test]
    async fn test_unknown_backend_is_400() {
        let resp = router(Config::default())
            .oneshot(post(json!({"images": [], "prompt": "x", "backend": "claude"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_labels_images_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/2.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "A parcel"}]}}],
                "usageMetadata": {"promptTokenCount": 270, "candidatesTokenCount": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.llm.gemini.api_key = "g-test".to_string();
        config.llm.gemini.endpoint = server.uri();

        let resp = router(config)
            .oneshot(post(json!({
                "images": [
                    {"image": format!("{}/img/1.jpg", server.uri()), "serialNumber": 31},
                    format!("{}/img/2.jpg", server.uri())
                ],
                "prompt": "What was delivered?",
                "backend": "gemini",
                "batchSize": 1
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert!(json.get("error").is_none());
        assert_eq!(json["processedCount"], 1);
        assert_eq!(json["errorCount"], 1);
        assert_eq!(json["totalTokens"], 273);
        assert_eq!(json["modelUsed"], "gemini");
        assert_eq!(json["results"][0]["label"], "A parcel");
        assert_eq!(json["results"][0]["serialNumber"], 31);
        assert_eq!(json["results"][1]["error"], true);
        assert_eq!(json["results"][1]["detailedError"], "Something went wrong");
    }

    #[tokio::test]
    async fn test_item_without_image_reference_is_400() {
        let mut config = Config::default();
        config.llm.gemini.api_key = "g-test".to_string();

        let resp = router(config)
            .oneshot(post(json!({
                "images": [{"camera": "porch"}, "https://cdn.example.com/a.jpg"],
                "prompt": "Who is there?",
                "backend": "gemini",
                "selected": [1]
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "images[0] has no image reference");
    }

    #[tokio::test]
    async fn test_selected_positions_follow_request_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/b.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.llm.gemini.api_key = "g-test".to_string();
        config.llm.gemini.endpoint = server.uri();

        let resp = router(config)
            .oneshot(post(json!({
                "images": [
                    {"image": format!("{}/img/z.jpg", server.uri()), "serialNumber": 9},
                    format!("{}/img/a.jpg", server.uri()),
                    format!("{}/img/b.jpg", server.uri())
                ],
                "prompt": "Who is there?",
                "backend": "gemini",
                "selected": [2]
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert!(json.get("error").is_none());
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
        assert_eq!(json["processedCount"], 1);
        assert!(json["results"][1]["label"].is_null());
        assert_eq!(json["results"][2]["label"], "ok");
        assert!(json["results"][2]["imageRef"].as_str().unwrap().ends_with("/img/b.jpg"));
    }

    #[tokio::test]
    async fn test_batch_size_override_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.llm.gemini.api_key = "g-test".to_string();
        config.batch.batch_size = 2;
        config.batch.max_batch_size = 2;
        let images: Vec<String> = (0..5)
            .map(|i| format!("{}/img/{i}.jpg", server.uri()))
            .collect();

        let started = Instant::now();
        let resp = router(config)
            .oneshot(post(json!({
                "images": images,
                "prompt": "x",
                "backend": "gemini",
                "batchSize": 10_000
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["errorCount"], 5);
        assert_eq!(json["results"].as_array().unwrap().len(), 5);
        // Three sequential chunks of at most two fetches each.
        assert!(started.elapsed() >= Duration::from_millis(550));
    }
}
