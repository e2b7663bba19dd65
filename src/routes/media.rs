//! Media-stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{media_stream_handler, voice::MEDIA_STREAM_PATH};
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for a telephony media stream
///
/// # Protocol
///
/// The telephony provider sends JSON frames tagged by `event` (`connected`,
/// `start`, `media`, `mark`, `stop`); media payloads are base64 μ-law 8kHz.
/// The server answers with `media` frames carrying the agent's audio.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
