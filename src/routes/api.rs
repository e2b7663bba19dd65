use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, voice};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router
///
/// - `GET /` - liveness banner
/// - `GET /health` - health check
/// - `GET|POST /incoming-call` - TwiML call-answer webhook
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health_check))
        .route(
            "/incoming-call",
            get(voice::incoming_call).post(voice::incoming_call),
        )
        .layer(TraceLayer::new_for_http())
}
