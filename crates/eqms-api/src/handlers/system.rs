use axum::extract::State;
use std::sync::Arc;

use crate::extract::Json;
use crate::models::HealthResponse;
use crate::AppState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        event_subscribers: state.events().subscriber_count(),
    })
}
