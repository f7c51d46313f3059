//! Health check and fallback handlers

use apod_types::{ErrorResponse, HealthResponse};
use axum::{
    http::{StatusCode, Uri},
    Json,
};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Unrouted paths get a JSON 404 like every other error
pub async fn fallback(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("No route for {}", uri.path()))),
    )
}
