use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: String,
}

/// Plain-text liveness banner served at `/`.
pub async fn index() -> &'static str {
    "Call bridge server is running!"
}

/// Health check handler
///
/// Reports the configured realtime provider. Does not contact the backend.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK",
        provider: state.config.provider.to_string(),
    })
}
