//! Observation hooks for bridge sessions.
//!
//! The bridge reports everything noteworthy through a [`BridgeObserver`]
//! instead of logging inline, so tests can assert on what happened and
//! deployments can attach metrics without touching the relay loops.

use std::fmt;

use tracing::{debug, info, warn};

use super::error::BridgeError;
use super::session::{SessionHandle, SessionSummary};
use crate::core::realtime::HandshakeOutcome;
use crate::core::telephony::TelephonyError;

/// Relay direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Caller to backend
    Inbound,
    /// Backend to caller
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

#[derive(Debug)]
pub enum BridgeEvent {
    SessionStarted,
    BackendConnectFailed(BridgeError),
    Handshake(HandshakeOutcome),
    StreamStarted { stream_id: String },
    DecodeFailed(TelephonyError),
    FrameDropped { direction: Direction, reason: &'static str },
    SendFailed { direction: Direction, error: BridgeError },
    /// Non-audio backend event, with optional detail
    Backend { kind: &'static str, detail: Option<String> },
    SessionClosed(SessionSummary),
}

pub trait BridgeObserver: Send + Sync {
    fn on_event(&self, session: &SessionHandle, event: &BridgeEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BridgeObserver for TracingObserver {
    fn on_event(&self, session: &SessionHandle, event: &BridgeEvent) {
        let call_id = session.call_id();
        let stream_id = session.stream_id().unwrap_or("-");

        match event {
            BridgeEvent::SessionStarted => info!(%call_id, "Call session started"),
            BridgeEvent::BackendConnectFailed(error) => {
                warn!(%call_id, %error, "Failed to open realtime backend")
            }
            BridgeEvent::Handshake(outcome) => {
                info!(%call_id, handshake = %outcome, "Realtime backend ready")
            }
            BridgeEvent::StreamStarted { stream_id } => {
                info!(%call_id, %stream_id, "Media stream started")
            }
            BridgeEvent::DecodeFailed(error) => {
                warn!(%call_id, %stream_id, %error, "Skipping malformed telephony frame")
            }
            BridgeEvent::FrameDropped { direction, reason } => {
                debug!(%call_id, %stream_id, %direction, reason, "Frame dropped")
            }
            BridgeEvent::SendFailed { direction, error } => {
                warn!(%call_id, %stream_id, %direction, %error, fatal = error.is_fatal(), "Failed to relay frame")
            }
            BridgeEvent::Backend { kind, detail } => match *kind {
                "error" => warn!(%call_id, %stream_id, detail = ?detail, "Backend reported an error"),
                _ => debug!(%call_id, %stream_id, kind, detail = ?detail, "Backend event"),
            },
            BridgeEvent::SessionClosed(summary) => info!(
                %call_id,
                %stream_id,
                frames_in = summary.frames_in,
                frames_out = summary.frames_out,
                frames_dropped = summary.frames_dropped,
                "Call session closed"
            ),
        }
    }
}
