//! Base traits and types for realtime conversational-AI backends.
//!
//! A backend is reduced to four operations regardless of vendor:
//!
//! - `open` - connect, send the setup message, wait (bounded) for the ack
//! - `send_audio` - forward one PCM16 frame at the backend's input rate
//! - `receive` - a lazy, one-pass sequence of [`BackendEvent`]s ending in `Closed`
//! - `close` - idempotent release of the connection
//!
//! Vendor differences (setup shape, audio envelope field names, sample rates,
//! event discriminators) are isolated behind [`RealtimeProtocol`].
//!
//! # Supported Providers
//!
//! - Gemini Live API (16kHz in / 24kHz out)
//! - OpenAI Realtime API (24kHz in / 24kHz out)

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::connection::BackendConnection;
use crate::core::audio::AudioFrame;

/// Default bound on the setup-acknowledgement wait.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime backend operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the backend could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed or credentials missing
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Setup was not acknowledged in time and the policy forbids proceeding
    #[error("Setup acknowledgement not received within {0:?}")]
    HandshakeTimeout(Duration),

    /// A single frame could not be sent
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The frame does not match what the backend expects
    #[error("Invalid audio frame: {0}")]
    InvalidFrame(String),

    /// The underlying connection is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error reported by the backend's own protocol
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl RealtimeError {
    /// Connection-level errors end the session; frame-level errors do not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RealtimeError::ConnectionFailed(_)
                | RealtimeError::AuthenticationFailed(_)
                | RealtimeError::InvalidConfiguration(_)
                | RealtimeError::HandshakeTimeout(_)
                | RealtimeError::ConnectionClosed
        )
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Supported realtime backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeProvider {
    /// Gemini Live API
    #[default]
    Gemini,
    /// OpenAI Realtime API
    OpenAI,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "gemini-live" | "gemini_live" | "google" => Some(RealtimeProvider::Gemini),
            "openai" | "openai-realtime" => Some(RealtimeProvider::OpenAI),
            _ => None,
        }
    }
}

impl fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealtimeProvider::Gemini => write!(f, "gemini"),
            RealtimeProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// What the backend should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    #[default]
    Audio,
    Text,
}

impl ResponseModality {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "audio" => Some(Self::Audio),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// What to do when the setup acknowledgement does not arrive in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakePolicy {
    /// Log a warning and start streaming anyway
    #[default]
    Continue,
    /// Fail the open call
    Abort,
}

impl HandshakePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "proceed" => Some(Self::Continue),
            "abort" | "fail" => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Static per-call backend configuration.
///
/// Built once from the process configuration and cloned into every session.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: RealtimeProvider,
    pub api_key: String,
    pub model: String,
    /// WebSocket endpoint override; vendor default when `None`
    pub endpoint: Option<String>,
    pub voice: String,
    pub instructions: String,
    pub modality: ResponseModality,
    /// PCM16 rate the backend accepts
    pub input_sample_rate: u32,
    /// PCM16 rate the backend produces
    pub output_sample_rate: u32,
    /// User turn sent right after setup so the agent speaks first
    pub initial_prompt: Option<String>,
    pub handshake_timeout: Duration,
    pub handshake_policy: HandshakePolicy,
}

impl BackendConfig {
    /// Configuration with the provider's default model, voice and rates.
    pub fn new(provider: RealtimeProvider, api_key: impl Into<String>) -> Self {
        let (model, voice, input_rate, output_rate) = match provider {
            RealtimeProvider::Gemini => (
                super::gemini::GEMINI_DEFAULT_MODEL,
                super::gemini::GEMINI_DEFAULT_VOICE,
                super::gemini::GEMINI_INPUT_SAMPLE_RATE,
                super::gemini::GEMINI_OUTPUT_SAMPLE_RATE,
            ),
            RealtimeProvider::OpenAI => (
                super::openai::OPENAI_DEFAULT_MODEL,
                super::openai::OPENAI_DEFAULT_VOICE,
                super::openai::OPENAI_REALTIME_SAMPLE_RATE,
                super::openai::OPENAI_REALTIME_SAMPLE_RATE,
            ),
        };

        Self {
            provider,
            api_key: api_key.into(),
            model: model.to_string(),
            endpoint: None,
            voice: voice.to_string(),
            instructions: String::new(),
            modality: ResponseModality::Audio,
            input_sample_rate: input_rate,
            output_sample_rate: output_rate,
            initial_prompt: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshake_policy: HandshakePolicy::Continue,
        }
    }

    /// Check the configuration before any connection attempt.
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(format!(
                "API key is required for the {} backend",
                self.provider
            )));
        }
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(RealtimeError::InvalidConfiguration(
                "sample rates must be non-zero".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(RealtimeError::InvalidConfiguration(
                "handshake timeout must be non-zero".to_string(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            let parsed = url::Url::parse(endpoint).map_err(|e| {
                RealtimeError::InvalidConfiguration(format!("invalid endpoint '{endpoint}': {e}"))
            })?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "endpoint must use ws:// or wss://, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

/// Why the backend event sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The backend closed the connection
    Remote,
    /// Transport failure
    Error(String),
    /// We closed it
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Remote => write!(f, "closed by backend"),
            CloseReason::Error(e) => write!(f, "connection error: {e}"),
            CloseReason::Local => write!(f, "closed locally"),
        }
    }
}

/// Typed events produced by a backend connection.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Synthesized speech, PCM16 at the backend output rate
    AudioDelta(AudioFrame),
    /// Text emitted by the model (transcript or text modality)
    Text(String),
    /// The model finished its turn
    TurnComplete,
    /// The model requested a tool invocation
    ToolCall(serde_json::Value),
    /// Error reported by the backend protocol
    Error(String),
    /// Anything else, with its discriminator
    Unknown(String),
    /// Terminal event: the sequence ends after this
    Closed(CloseReason),
}

impl BackendEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendEvent::AudioDelta(_) => "audio_delta",
            BackendEvent::Text(_) => "text",
            BackendEvent::TurnComplete => "turn_complete",
            BackendEvent::ToolCall(_) => "tool_call",
            BackendEvent::Error(_) => "error",
            BackendEvent::Unknown(_) => "unknown",
            BackendEvent::Closed(_) => "closed",
        }
    }
}

/// Result of the setup handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The backend acknowledged setup
    Confirmed,
    /// No acknowledgement within the timeout; streaming anyway
    TimedOut,
    /// The backend answered setup with an error; streaming anyway
    Rejected(String),
}

impl fmt::Display for HandshakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeOutcome::Confirmed => write!(f, "confirmed"),
            HandshakeOutcome::TimedOut => write!(f, "timed_out"),
            HandshakeOutcome::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

/// One decoded server message.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Setup acknowledgement
    SetupComplete,
    /// Something the bridge should see
    Event(BackendEvent),
    /// Protocol bookkeeping with no meaning to the bridge
    Ignored(String),
}

// =============================================================================
// Traits
// =============================================================================

/// Vendor-specific wire format.
///
/// Implementations are pure message builders and parsers; the shared
/// connection driver owns the socket.
pub trait RealtimeProtocol: Send + Sync + 'static {
    fn provider(&self) -> RealtimeProvider;

    /// WebSocket upgrade request including authentication.
    fn connect_request(&self) -> RealtimeResult<Request>;

    /// The single setup message sent right after connecting.
    fn setup_message(&self) -> RealtimeResult<String>;

    /// Messages that inject a user text turn and ask for a response.
    fn prompt_messages(&self, prompt: &str) -> RealtimeResult<Vec<String>>;

    /// Envelope for one PCM16 chunk at the configured input rate.
    fn audio_message(&self, pcm16: &[u8]) -> RealtimeResult<String>;

    /// Decode one inbound message. A message may carry several events.
    fn parse_server_message(&self, text: &str) -> RealtimeResult<Vec<ServerMessage>>;
}

/// Entry point for opening backend connections.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Connect and perform the setup handshake.
    async fn open(&self, config: &BackendConfig) -> RealtimeResult<BackendConnection>;
}
