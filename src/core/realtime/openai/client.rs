//! OpenAI Realtime API wire protocol.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//! - Setup: `session.update`, acknowledged by `session.updated`

use bytes::Bytes;
use http::HeaderValue;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::config::{OPENAI_AUDIO_FORMAT, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL};
use super::messages::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, TurnDetection};
use crate::core::audio::AudioFrame;
use crate::core::realtime::base::{
    BackendConfig, BackendEvent, RealtimeError, RealtimeProtocol, RealtimeProvider,
    RealtimeResult, ResponseModality, ServerMessage,
};

/// OpenAI Realtime protocol bound to one backend configuration.
#[derive(Debug, Clone)]
pub struct OpenAIRealtime {
    config: BackendConfig,
}

impl OpenAIRealtime {
    pub fn new(config: BackendConfig) -> RealtimeResult<Self> {
        config.validate()?;
        if config.input_sample_rate != OPENAI_REALTIME_SAMPLE_RATE {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "OpenAI Realtime expects {OPENAI_REALTIME_SAMPLE_RATE}Hz PCM16 input, got {}Hz",
                config.input_sample_rate
            )));
        }
        Ok(Self { config })
    }

    fn build_ws_url(&self) -> RealtimeResult<url::Url> {
        let base = self.config.endpoint.as_deref().unwrap_or(OPENAI_REALTIME_URL);
        let mut url = url::Url::parse(base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("model", &self.config.model);
        Ok(url)
    }

    fn build_session_config(&self) -> SessionConfig {
        let modalities = match self.config.modality {
            ResponseModality::Audio => vec!["text".to_string(), "audio".to_string()],
            ResponseModality::Text => vec!["text".to_string()],
        };

        SessionConfig {
            modalities: Some(modalities),
            instructions: Some(self.config.instructions.clone()).filter(|i| !i.is_empty()),
            voice: Some(self.config.voice.clone()),
            input_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: None,
                silence_duration_ms: None,
                create_response: Some(true),
            }),
        }
    }

    fn encode(event: &ClientEvent) -> RealtimeResult<String> {
        serde_json::to_string(event).map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }
}

impl RealtimeProtocol for OpenAIRealtime {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::OpenAI
    }

    fn connect_request(&self) -> RealtimeResult<Request> {
        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::AuthenticationFailed(format!("invalid API key: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }

    fn setup_message(&self) -> RealtimeResult<String> {
        Self::encode(&ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        })
    }

    fn prompt_messages(&self, prompt: &str) -> RealtimeResult<Vec<String>> {
        Ok(vec![
            Self::encode(&ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(prompt),
            })?,
            Self::encode(&ClientEvent::ResponseCreate)?,
        ])
    }

    fn audio_message(&self, pcm16: &[u8]) -> RealtimeResult<String> {
        Self::encode(&ClientEvent::audio_append(pcm16))
    }

    fn parse_server_message(&self, text: &str) -> RealtimeResult<Vec<ServerMessage>> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("<untyped>")
            .to_string();

        let event = match serde_json::from_value::<ServerEvent>(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Malformed OpenAI server event");
                return Ok(vec![ServerMessage::Event(BackendEvent::Unknown(kind))]);
            }
        };

        let message = match event {
            ServerEvent::SessionUpdated => ServerMessage::SetupComplete,
            ServerEvent::Error { error } => ServerMessage::Event(BackendEvent::Error(
                match error.code {
                    Some(code) => format!("{code}: {}", error.message),
                    None => error.message,
                },
            )),
            ServerEvent::AudioDelta { delta } => match ServerEvent::decode_audio_delta(&delta) {
                Ok(audio) => ServerMessage::Event(BackendEvent::AudioDelta(AudioFrame::linear16(
                    Bytes::from(audio),
                    self.config.output_sample_rate,
                ))),
                Err(e) => {
                    tracing::error!("Failed to decode audio delta: {}", e);
                    ServerMessage::Ignored(kind)
                }
            },
            ServerEvent::AudioTranscriptDone { transcript: text } | ServerEvent::TextDone { text } => {
                ServerMessage::Event(BackendEvent::Text(text))
            }
            ServerEvent::ResponseDone => ServerMessage::Event(BackendEvent::TurnComplete),
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => ServerMessage::Event(BackendEvent::ToolCall(serde_json::json!({
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            }))),
            ServerEvent::SessionCreated
            | ServerEvent::ResponseCreated
            | ServerEvent::AudioTranscriptDelta
            | ServerEvent::TextDelta
            | ServerEvent::SpeechStarted
            | ServerEvent::SpeechStopped
            | ServerEvent::RateLimitsUpdated => ServerMessage::Ignored(kind),
            ServerEvent::Other => ServerMessage::Event(BackendEvent::Unknown(kind)),
        };

        Ok(vec![message])
    }
}
