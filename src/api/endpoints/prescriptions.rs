//! Document-URL discovery endpoint.

use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AppContext, UrlsRequest, UrlsResponse};

/// `POST /api/prescription-urls`
pub async fn discover(
    State(ctx): State<AppContext>,
    Json(req): Json<UrlsRequest>,
) -> Result<Json<UrlsResponse>, ApiError> {
    run(ctx, req).await
}

/// `GET /api/prescription-urls` — query-parameter variant for quick checks.
pub async fn discover_query(
    State(ctx): State<AppContext>,
    Query(req): Query<UrlsRequest>,
) -> Result<Json<UrlsResponse>, ApiError> {
    run(ctx, req).await
}

async fn run(ctx: AppContext, req: UrlsRequest) -> Result<Json<UrlsResponse>, ApiError> {
    let patient_id = req.patient_id.trim();
    if patient_id.is_empty() {
        return Err(ApiError::BadRequest("patient_id must not be empty".into()));
    }

    let discovery = ctx.orchestrator.discover(patient_id, req.page_no).await?;
    Ok(Json(UrlsResponse {
        patient_id: discovery.patient_id,
        count: discovery.urls.len(),
        urls: discovery.urls.into_iter().map(|c| c.url).collect(),
    }))
}
