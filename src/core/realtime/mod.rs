//! Realtime conversational-AI backend module.
//!
//! This module provides a vendor-agnostic session adapter for speech-to-speech
//! backends reachable over WebSocket.
//!
//! # Supported Providers
//!
//! - **Gemini Live API** - native-audio Gemini models
//! - **OpenAI Realtime API** - GPT-4o realtime models
//!
//! # Architecture
//!
//! - `RealtimeProtocol` isolates each vendor's wire format
//! - `connection::connect` owns the socket lifecycle and the setup handshake
//! - `BaseRealtime` is the seam the bridge depends on, so tests can swap in
//!   any backend that speaks one of the protocols
//!
//! # Example
//!
//! ```rust,ignore
//! use call_bridge::core::realtime::{BackendConfig, BaseRealtime, RealtimeProvider, WebSocketRealtime};
//!
//! let config = BackendConfig::new(RealtimeProvider::Gemini, api_key);
//! let mut connection = WebSocketRealtime.open(&config).await?;
//! let mut events = connection.take_events().unwrap();
//! connection.send_audio(&frame).await?;
//! while let Some(event) = events.next().await { /* ... */ }
//! connection.close().await;
//! ```

mod base;
mod connection;
pub mod gemini;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

pub use base::{
    BackendConfig, BackendEvent, BaseRealtime, CloseReason, DEFAULT_HANDSHAKE_TIMEOUT,
    HandshakeOutcome, HandshakePolicy, RealtimeError, RealtimeProtocol, RealtimeProvider,
    RealtimeResult, ResponseModality, ServerMessage,
};
pub use connection::{BackendConnection, BackendEvents, BackendSender};
pub use gemini::GeminiLive;
pub use openai::OpenAIRealtime;

/// Factory function to create the wire protocol for a provider.
pub fn create_realtime_protocol(
    config: &BackendConfig,
) -> RealtimeResult<Arc<dyn RealtimeProtocol>> {
    match config.provider {
        RealtimeProvider::Gemini => Ok(Arc::new(GeminiLive::new(config.clone())?)),
        RealtimeProvider::OpenAI => Ok(Arc::new(OpenAIRealtime::new(config.clone())?)),
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["gemini", "openai"]
}

/// Backend reached over a WebSocket, using the provider named in the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketRealtime;

#[async_trait]
impl BaseRealtime for WebSocketRealtime {
    async fn open(&self, config: &BackendConfig) -> RealtimeResult<BackendConnection> {
        let protocol = create_realtime_protocol(config)?;
        connection::connect(protocol, config).await
    }
}
