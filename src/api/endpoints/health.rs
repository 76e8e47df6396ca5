//! Liveness check.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
}

/// `GET /healthz`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: crate::config::APP_VERSION,
    })
}
