//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::platform::PlatformError;

/// Structured error response body for the UI.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    /// Our credential exchange with the platform was exhausted.
    #[error("Platform authentication failed: {0}")]
    PlatformAuth(String),
    /// The platform was unreachable or answered with an error.
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::PlatformAuth(detail) => (
                StatusCode::BAD_GATEWAY,
                "PLATFORM_AUTH",
                format!("Clinical platform authentication failed: {detail}"),
            ),
            ApiError::Upstream(detail) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM",
                format!("Clinical platform error: {detail}"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Auth(detail) => ApiError::PlatformAuth(detail),
            PlatformError::Api { status, detail } => {
                ApiError::Upstream(format!("status {status}: {detail}"))
            }
            PlatformError::Transport(detail) => ApiError::Upstream(detail),
            PlatformError::Decode(detail) => ApiError::Upstream(detail),
        }
    }
}
