//! Per-call session state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::realtime::{BackendConnection, HandshakeOutcome};

/// Lifecycle of one call. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingStart,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingStart => write!(f, "awaiting_start"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Final accounting for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub call_id: Uuid,
    pub stream_id: Option<String>,
    pub state: SessionState,
    /// Caller frames forwarded to the backend
    pub frames_in: u64,
    /// Backend frames forwarded to the caller
    pub frames_out: u64,
    pub frames_dropped: u64,
    /// `None` when the backend never opened
    pub handshake: Option<HandshakeOutcome>,
}

struct SessionShared {
    call_id: Uuid,
    stream_id: OnceLock<String>,
    state: Mutex<SessionState>,
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    frames_dropped: AtomicU64,
    cancel: CancellationToken,
}

/// Shared view of a session, handed to both relay directions.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionShared>,
}

impl SessionHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(SessionShared {
                call_id: Uuid::new_v4(),
                stream_id: OnceLock::new(),
                state: Mutex::new(SessionState::AwaitingStart),
                frames_in: AtomicU64::new(0),
                frames_out: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.inner.call_id
    }

    /// Stream id, once the telephony `start` event has been seen.
    pub fn stream_id(&self) -> Option<&str> {
        self.inner.stream_id.get().map(String::as_str)
    }

    /// Publish the stream id and become `Active`. Only the first call wins.
    pub fn publish_stream_id(&self, stream_id: String) -> bool {
        if self.inner.stream_id.set(stream_id).is_err() {
            return false;
        }
        self.advance(SessionState::Active);
        true
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    fn advance(&self, to: SessionState) -> bool {
        let mut state = self.inner.state.lock();
        if to > *state {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Enter `Closing` and signal both directions to stop.
    pub fn begin_closing(&self) -> bool {
        let changed = self.advance(SessionState::Closing);
        self.inner.cancel.cancel();
        changed
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn record_in(&self) {
        self.inner.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out(&self) {
        self.inner.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_in(&self) -> u64 {
        self.inner.frames_in.load(Ordering::Relaxed)
    }

    pub fn frames_out(&self) -> u64 {
        self.inner.frames_out.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.inner.frames_dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("call_id", &self.call_id())
            .field("stream_id", &self.stream_id())
            .field("state", &self.state())
            .finish()
    }
}

/// One telephony call bridged to one backend connection.
///
/// Owns the backend connection exclusively and releases it when it moves to
/// `Closed`.
#[derive(Debug)]
pub struct CallSession {
    handle: SessionHandle,
    backend: Option<BackendConnection>,
    handshake: Option<HandshakeOutcome>,
}

impl CallSession {
    pub fn new() -> Self {
        Self {
            handle: SessionHandle::new(),
            backend: None,
            handshake: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn call_id(&self) -> Uuid {
        self.handle.call_id()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn attach_backend(&mut self, connection: BackendConnection) {
        self.handshake = Some(connection.handshake().clone());
        self.backend = Some(connection);
    }

    /// Close the backend connection. Safe to call more than once.
    pub async fn release_backend(&mut self) {
        self.handle.begin_closing();
        if let Some(mut backend) = self.backend.take() {
            backend.close().await;
        }
    }

    /// Move to `Closed`. Returns `true` only for the call that made the transition.
    pub fn mark_closed(&mut self) -> bool {
        self.handle.begin_closing();
        self.handle.advance(SessionState::Closed)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            call_id: self.handle.call_id(),
            stream_id: self.handle.stream_id().map(str::to_string),
            state: self.handle.state(),
            frames_in: self.handle.frames_in(),
            frames_out: self.handle.frames_out(),
            frames_dropped: self.handle.frames_dropped(),
            handshake: self.handshake.clone(),
        }
    }
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}
