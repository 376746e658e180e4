//! JSON error responses for the HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use framelabel_core::LogError;
use serde_json::json;
use std::fmt;

/// Errors returned by the HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed request parameters
    BadRequest(String),
    /// The requested resource does not exist
    NotFound(String),
    /// Anything the caller cannot fix
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                tracing::error!("Request failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    framelabel_core::types::GENERIC_ERROR.to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::InvalidFilename(name) => Self::BadRequest(format!("Invalid filename: {name}")),
            LogError::NotFound(name) => Self::NotFound(format!("Log file not found: {name}")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_mapping() {
        assert!(matches!(
            ApiError::from(LogError::InvalidFilename("../x".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(LogError::NotFound("a.json".into())),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let resp = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
