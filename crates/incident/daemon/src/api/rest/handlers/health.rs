//! Health handler

use crate::api::rest::state::AppState;
use crate::error::ApiResponse;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Liveness; needs no caller headers.
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<ApiResponse<HealthCheckResponse>> {
    ApiResponse::ok(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}
