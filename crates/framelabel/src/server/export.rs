//! `POST /api/export`: render a result list as a downloadable JSON or CSV file.

use super::ApiError;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Form;
use framelabel_core::export::{self, ApiType, ExportFormat};
use serde::Deserialize;
use serde_json::Value;

/// Form fields accepted by the export endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportForm {
    /// JSON-encoded array of result records
    pub data: Option<String>,
    /// `json` or `csv`
    pub format: Option<String>,
    /// Selects the CSV column schema
    pub api_type: Option<String>,
}

pub async fn export(Form(form): Form<ExportForm>) -> Result<Response, ApiError> {
    let data = form
        .data
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing data".to_string()))?;

    let format_name = form.format.unwrap_or_else(|| "json".to_string());
    let format = ExportFormat::parse(&format_name)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported format: {format_name}")))?;
    let api_type = form
        .api_type
        .as_deref()
        .map(ApiType::parse)
        .unwrap_or_default();

    let records: Vec<Value> = serde_json::from_str(&data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid data: {e}")))?;

    let body = export::format(&records, format, api_type)?;
    let filename = export::filename(format, api_type);
    tracing::debug!("Exporting {} records as {filename}", records.len());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{body_bytes, body_json, router};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use framelabel_core::Config;
    use tower::ServiceExt;

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/export")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn encode(value: &str) -> String {
        let mut out = String::new();
        for b in value.bytes() {
            match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
                _ => out.push_str(&format!("%{b:02X}")),
            }
        }
        out
    }

    #[tokio::test]
    async fn test_csv_export_is_attachment() {
        let data = r#"[{"imageRef":"https://x/1.jpg","label":"He said \"ok\"","processed":true,"error":false}]"#;
        let body = format!("data={}&format=csv&apiType=images", encode(data));

        let resp = router(Config::default()).oneshot(form_request(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"labels-images-"));
        assert!(disposition.ends_with(".csv\""));

        let csv = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(csv.contains(r#""He said ""ok""""#));
        assert!(csv.contains(r#""Yes","No""#));
    }

    #[tokio::test]
    async fn test_json_export_roundtrips_records() {
        let data = r#"[{"label":"cat","extra":{"camera":"porch"}}]"#;
        let body = format!("data={}&format=json", encode(data));

        let resp = router(Config::default()).oneshot(form_request(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json[0]["extra"]["camera"], "porch");
    }

    #[tokio::test]
    async fn test_missing_data_is_400() {
        let resp = router(Config::default())
            .oneshot(form_request("format=csv"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing data");
    }

    #[tokio::test]
    async fn test_unsupported_format_is_400() {
        let body = format!("data={}&format=xml", encode("[]"));
        let resp = router(Config::default()).oneshot(form_request(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported format"));
    }
}
