pub mod api;
pub mod media;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Full application router: HTTP endpoints plus the media-stream WebSocket.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(media::create_media_router())
        .with_state(state)
}
