use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::bridge::Bridge;
use crate::core::realtime::WebSocketRealtime;

/// Shared application state.
///
/// Built once at startup; every media-stream connection gets its own session
/// from the shared [`Bridge`].
pub struct AppState {
    pub config: ServerConfig,
    pub bridge: Bridge,
}

impl AppState {
    /// State backed by the WebSocket realtime backends.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let bridge = Bridge::new(Arc::new(WebSocketRealtime), config.backend_config());
        Self::with_bridge(config, bridge)
    }

    pub fn with_bridge(config: ServerConfig, bridge: Bridge) -> Arc<Self> {
        Arc::new(Self { config, bridge })
    }
}
