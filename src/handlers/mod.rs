//! HTTP and WebSocket request handlers
//!
//! - `api` - Index and health check endpoints
//! - `voice` - Call-answer responder returning TwiML
//! - `media_stream` - Telephony media-stream WebSocket, bridged to the realtime backend

pub mod api;
pub mod media_stream;
pub mod voice;

pub use media_stream::media_stream_handler;
pub use voice::incoming_call;
