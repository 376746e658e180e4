//! `GET /api/logs` (list, view, download) and `DELETE /api/logs` (reset).

use super::{ApiError, AppState};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use framelabel_core::FileResponseLog;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryParams {
    /// `list` (default), `view` or `download`
    pub action: Option<String>,
    /// Inclusive UTC date bounds, `YYYY-MM-DD`
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResetParams {
    pub action: Option<String>,
    /// Only delete files older than this many days; 0 or absent deletes all
    pub older_than_days: Option<u32>,
}

pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<LogQueryParams>,
) -> Result<Response, ApiError> {
    let log = state.app.response_log();
    match params.action.as_deref().unwrap_or("list") {
        "list" => {
            let start = parse_date(params.start_date.as_deref(), "startDate")?;
            let end = parse_date(params.end_date.as_deref(), "endDate")?;
            let files = log.run_blocking(move |log| log.list(start, end)).await?;
            Ok(Json(json!({ "count": files.len(), "files": files })).into_response())
        }
        "view" => {
            let content = read_blocking(&log, required_filename(&params)?).await?;
            let value: Value = serde_json::from_str(&content)?;
            Ok(Json(value).into_response())
        }
        "download" => {
            let filename = required_filename(&params)?;
            let content = read_blocking(&log, filename).await?;
            Ok((
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                content,
            )
                .into_response())
        }
        other => Err(ApiError::BadRequest(format!("Unknown action: {other}"))),
    }
}

pub async fn reset(
    State(state): State<AppState>,
    Query(params): Query<LogResetParams>,
) -> Result<Json<Value>, ApiError> {
    if params.action.as_deref() != Some("reset") {
        return Err(ApiError::BadRequest(
            "DELETE requires action=reset".to_string(),
        ));
    }
    let days = params.older_than_days.unwrap_or(0);
    let deleted = state
        .app
        .response_log()
        .run_blocking(move |log| log.purge(days))
        .await?;
    tracing::info!("Response log reset: {deleted} file(s) removed");
    Ok(Json(json!({ "deleted": deleted })))
}

async fn read_blocking(log: &FileResponseLog, filename: &str) -> Result<String, ApiError> {
    let filename = filename.to_string();
    Ok(log.run_blocking(move |log| log.read(&filename)).await?)
}

fn parse_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: {v}")))
        })
        .transpose()
}

fn required_filename(params: &LogQueryParams) -> Result<&str, ApiError> {
    params
        .filename
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing filename".to_string()))
}
