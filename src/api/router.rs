//! Route table for the pipeline API.
//!
//! Two operations, each with a POST (JSON body) and GET (query) variant,
//! plus a liveness check. CORS is open: the presentation layer runs on its
//! own dev origin and sends plain JSON.

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::types::AppContext;

pub fn api_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(endpoints::health::check))
        .route(
            "/api/prescription-urls",
            get(endpoints::prescriptions::discover_query).post(endpoints::prescriptions::discover),
        )
        .route(
            "/api/patient-summary",
            get(endpoints::summary::generate_query).post(endpoints::summary::generate),
        )
        .with_state(ctx)
        .layer(cors)
}
