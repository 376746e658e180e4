//! `GET /api/estimate`: projected spend for a number of images.

use super::{ApiError, AppState};
use axum::extract::{Query, State};
use axum::Json;
use framelabel_core::{BackendKind, CostEstimate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateParams {
    pub image_count: Option<u64>,
    pub backend: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub image_count: u64,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub estimate: CostEstimate,
}

pub async fn estimate(
    State(state): State<AppState>,
    Query(params): Query<EstimateParams>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let image_count = params
        .image_count
        .ok_or_else(|| ApiError::BadRequest("Missing imageCount".to_string()))?;
    let backend = match params.backend.as_deref() {
        Some(name) => name.parse::<BackendKind>().map_err(ApiError::BadRequest)?,
        None => BackendKind::default(),
    };
    let model = params.model.filter(|m| !m.trim().is_empty());

    let estimate = state
        .app
        .rates()
        .estimate(image_count, backend, model.as_deref())
        .ok_or_else(|| ApiError::BadRequest(format!("imageCount {image_count} is too large")))?;
    Ok(Json(EstimateResponse {
        image_count,
        backend,
        model,
        estimate,
    }))
}
