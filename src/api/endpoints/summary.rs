//! Patient-journey summary endpoint.

use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AppContext, SummaryRequest};
use crate::models::SummaryEnvelope;

/// `POST /api/patient-summary`
pub async fn generate(
    State(ctx): State<AppContext>,
    Json(req): Json<SummaryRequest>,
) -> Result<Json<SummaryEnvelope>, ApiError> {
    run(ctx, req).await
}

/// `GET /api/patient-summary` — query-parameter variant for quick checks.
pub async fn generate_query(
    State(ctx): State<AppContext>,
    Query(req): Query<SummaryRequest>,
) -> Result<Json<SummaryEnvelope>, ApiError> {
    run(ctx, req).await
}

async fn run(ctx: AppContext, req: SummaryRequest) -> Result<Json<SummaryEnvelope>, ApiError> {
    let patient_id = req.patient_id.trim();
    if patient_id.is_empty() {
        return Err(ApiError::BadRequest("patient_id must not be empty".into()));
    }

    let envelope = ctx
        .orchestrator
        .summarize(patient_id, req.page_no, req.limits())
        .await?;
    Ok(Json(envelope))
}
