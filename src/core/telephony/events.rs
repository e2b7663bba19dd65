use bytes::Bytes;
use thiserror::Error;

/// Inbound telephony events, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    /// The media stream is established
    Start { stream_id: String },
    /// Raw μ-law audio at 8kHz mono
    Media(Bytes),
    /// The caller hung up or the stream ended
    Stop,
    /// Playback marker echoed back by the provider
    Mark(Option<String>),
    /// Any other event tag
    Unknown(String),
}

/// Errors raised by the telephony channel adapter.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// One inbound frame could not be decoded
    #[error("Failed to decode telephony frame: {0}")]
    Decode(String),

    /// The WebSocket is gone
    #[error("Telephony channel closed")]
    ChannelClosed,

    /// Outbound audio before the stream id is known
    #[error("Media stream has not started")]
    StreamNotStarted,

    /// One outbound frame could not be written
    #[error("Failed to send telephony frame: {0}")]
    Send(String),
}

impl TelephonyError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TelephonyError::ChannelClosed)
    }
}
