//! Telephony media-stream WebSocket handler
//!
//! Each upgraded connection becomes one bridged call. The handler returns
//! when the bridge has released both sides.

use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

use crate::core::telephony::{TelephonyReceiver, TelephonySender};
use crate::state::AppState;

/// Maximum WebSocket frame size (1 MB); media frames are a few hundred bytes
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media stream WebSocket handler
///
/// Upgrades the HTTP connection and hands the socket to the call bridge.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state))
}

async fn handle_media_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();

    let summary = state
        .bridge
        .accept(TelephonyReceiver::new(receiver), TelephonySender::new(sender))
        .await;

    info!(
        call_id = %summary.call_id,
        stream_id = ?summary.stream_id,
        state = %summary.state,
        frames_in = summary.frames_in,
        frames_out = summary.frames_out,
        "Media stream connection finished"
    );
}
