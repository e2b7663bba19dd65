use thiserror::Error;

use crate::core::realtime::RealtimeError;
use crate::core::telephony::TelephonyError;

/// Any error surfaced while relaying a frame.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("backend: {0}")]
    Backend(#[from] RealtimeError),

    #[error("telephony: {0}")]
    Telephony(#[from] TelephonyError),
}

impl BridgeError {
    /// Whether the error means the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            BridgeError::Backend(e) => e.is_fatal(),
            BridgeError::Telephony(e) => e.is_fatal(),
        }
    }
}
