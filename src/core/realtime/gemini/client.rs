//! Gemini Live API wire protocol.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with camelCase JSON, often delivered as binary frames
//! - Audio in: PCM 16-bit, 16kHz, `realtimeInput.mediaChunks`
//! - Audio out: PCM 16-bit, 24kHz, `serverContent.modelTurn.parts[].inlineData`
//! - Setup: `setup`, acknowledged by `setupComplete`

use base64::prelude::*;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::config::{GEMINI_INPUT_SAMPLE_RATE, GEMINI_LIVE_URL, pcm_mime_type};
use super::messages::{
    Blob, ClientContent, ClientMessage, Content, GenerationConfig, PrebuiltVoiceConfig,
    RealtimeInput, ServerMessage as GeminiServerMessage, Setup, SpeechConfig, VoiceConfig,
};
use crate::core::audio::AudioFrame;
use crate::core::realtime::base::{
    BackendConfig, BackendEvent, RealtimeError, RealtimeProtocol, RealtimeProvider,
    RealtimeResult, ResponseModality, ServerMessage,
};

/// Gemini Live protocol bound to one backend configuration.
#[derive(Debug, Clone)]
pub struct GeminiLive {
    config: BackendConfig,
}

impl GeminiLive {
    pub fn new(config: BackendConfig) -> RealtimeResult<Self> {
        config.validate()?;
        if config.input_sample_rate != GEMINI_INPUT_SAMPLE_RATE {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Gemini Live expects {GEMINI_INPUT_SAMPLE_RATE}Hz PCM16 input, got {}Hz",
                config.input_sample_rate
            )));
        }
        Ok(Self { config })
    }

    fn build_ws_url(&self) -> RealtimeResult<url::Url> {
        let base = self.config.endpoint.as_deref().unwrap_or(GEMINI_LIVE_URL);
        let mut url = url::Url::parse(base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    fn build_setup(&self) -> Setup {
        let (modality, speech_config) = match self.config.modality {
            ResponseModality::Audio => (
                "AUDIO",
                Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice.clone(),
                        },
                    },
                }),
            ),
            ResponseModality::Text => ("TEXT", None),
        };

        Setup {
            model: self.config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![modality.to_string()],
                speech_config,
            },
            system_instruction: (!self.config.instructions.is_empty())
                .then(|| Content::text(None, &self.config.instructions)),
        }
    }

    fn encode(message: &ClientMessage) -> RealtimeResult<String> {
        serde_json::to_string(message).map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }

    fn decode_inline_audio(&self, blob: &Blob) -> Option<AudioFrame> {
        if !blob.mime_type.is_empty() && !blob.mime_type.starts_with("audio/pcm") {
            tracing::debug!(mime_type = %blob.mime_type, "Skipping non-PCM inline data");
            return None;
        }
        match BASE64_STANDARD.decode(&blob.data) {
            Ok(audio) => Some(AudioFrame::linear16(
                Bytes::from(audio),
                rate_from_mime(&blob.mime_type).unwrap_or(self.config.output_sample_rate),
            )),
            Err(e) => {
                tracing::error!("Failed to decode inline audio: {}", e);
                None
            }
        }
    }
}

/// Extract `rate=N` from a MIME type such as `audio/pcm;rate=24000`.
fn rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

impl RealtimeProtocol for GeminiLive {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::Gemini
    }

    fn connect_request(&self) -> RealtimeResult<Request> {
        self.build_ws_url()?
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
    }

    fn setup_message(&self) -> RealtimeResult<String> {
        Self::encode(&ClientMessage::Setup(self.build_setup()))
    }

    fn prompt_messages(&self, prompt: &str) -> RealtimeResult<Vec<String>> {
        Ok(vec![Self::encode(&ClientMessage::ClientContent(
            ClientContent {
                turns: vec![Content::text(Some("user"), prompt)],
                turn_complete: true,
            },
        ))?])
    }

    fn audio_message(&self, pcm16: &[u8]) -> RealtimeResult<String> {
        Self::encode(&ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: pcm_mime_type(self.config.input_sample_rate),
                data: BASE64_STANDARD.encode(pcm16),
            }],
        }))
    }

    fn parse_server_message(&self, text: &str) -> RealtimeResult<Vec<ServerMessage>> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        let kind = value
            .as_object()
            .and_then(|object| object.keys().next().cloned())
            .unwrap_or_else(|| "<empty>".to_string());

        let message: GeminiServerMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Malformed Gemini server message");
                return Ok(vec![ServerMessage::Event(BackendEvent::Unknown(kind))]);
            }
        };

        if message.setup_complete.is_some() {
            return Ok(vec![ServerMessage::SetupComplete]);
        }

        if let Some(content) = message.server_content {
            let mut messages = Vec::new();
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        if let Some(frame) = self.decode_inline_audio(&blob) {
                            messages.push(ServerMessage::Event(BackendEvent::AudioDelta(frame)));
                        }
                    } else if let Some(text) = part.text {
                        messages.push(ServerMessage::Event(BackendEvent::Text(text)));
                    }
                }
            }
            if content.interrupted == Some(true) {
                tracing::debug!("Gemini reported interruption");
            }
            if content.turn_complete == Some(true) {
                messages.push(ServerMessage::Event(BackendEvent::TurnComplete));
            }
            if messages.is_empty() {
                messages.push(ServerMessage::Ignored("serverContent".to_string()));
            }
            return Ok(messages);
        }

        if let Some(call) = message.tool_call {
            return Ok(vec![ServerMessage::Event(BackendEvent::ToolCall(call))]);
        }

        if let Some(error) = message.error {
            let detail = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Ok(vec![ServerMessage::Event(BackendEvent::Error(detail))]);
        }

        Ok(vec![ServerMessage::Event(BackendEvent::Unknown(kind))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> GeminiLive {
        let mut config = BackendConfig::new(RealtimeProvider::Gemini, "g-key");
        config.instructions = "You are a phone agent.".to_string();
        GeminiLive::new(config).unwrap()
    }

    #[test]
    fn test_connect_request_carries_key() {
        let request = protocol().connect_request().unwrap();
        let uri = request.uri().to_string();
        assert!(uri.starts_with("wss://generativelanguage.googleapis.com/ws/"));
        assert!(uri.ends_with("BidiGenerateContent?key=g-key"));
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = BackendConfig::new(RealtimeProvider::Gemini, "k");
        config.endpoint = Some("ws://127.0.0.1:9999/live".to_string());
        let request = GeminiLive::new(config).unwrap().connect_request().unwrap();
        assert_eq!(request.uri().to_string(), "ws://127.0.0.1:9999/live?key=k");
    }

    #[test]
    fn test_setup_message() {
        let setup: serde_json::Value =
            serde_json::from_str(&protocol().setup_message().unwrap()).unwrap();
        assert_eq!(
            setup["setup"]["model"],
            "models/gemini-2.5-flash-native-audio-preview-12-2025"
        );
        assert_eq!(
            setup["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            setup["setup"]["systemInstruction"]["parts"][0]["text"],
            "You are a phone agent."
        );
    }

    #[test]
    fn test_text_modality_has_no_speech_config() {
        let mut config = BackendConfig::new(RealtimeProvider::Gemini, "k");
        config.modality = ResponseModality::Text;
        let setup: serde_json::Value =
            serde_json::from_str(&GeminiLive::new(config).unwrap().setup_message().unwrap())
                .unwrap();
        assert_eq!(
            setup["setup"]["generationConfig"]["responseModalities"][0],
            "TEXT"
        );
        assert!(setup["setup"]["generationConfig"].get("speechConfig").is_none());
        assert!(setup["setup"].get("systemInstruction").is_none());
    }

    #[test]
    fn test_prompt_and_audio_messages() {
        let p = protocol();
        let prompt: serde_json::Value =
            serde_json::from_str(&p.prompt_messages("Hi there").unwrap()[0]).unwrap();
        assert_eq!(prompt["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(prompt["clientContent"]["turns"][0]["parts"][0]["text"], "Hi there");
        assert_eq!(prompt["clientContent"]["turnComplete"], true);

        let audio: serde_json::Value =
            serde_json::from_str(&p.audio_message(&[1, 0, 2, 0]).unwrap()).unwrap();
        let chunk = &audio["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(
            BASE64_STANDARD.decode(chunk["data"].as_str().unwrap()).unwrap(),
            vec![1, 0, 2, 0]
        );
    }

    #[test]
    fn test_parse_setup_complete() {
        let messages = protocol()
            .parse_server_message(r#"{"setupComplete": {}}"#)
            .unwrap();
        assert!(matches!(messages[..], [ServerMessage::SetupComplete]));
    }

    #[test]
    fn test_parse_model_turn_preserves_part_order() {
        let audio = BASE64_STANDARD.encode([0u8, 1, 2, 3]);
        let text = serde_json::json!({
            "serverContent": {
                "modelTurn": {"parts": [
                    {"text": "hello"},
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": audio}}
                ]},
                "turnComplete": true
            }
        })
        .to_string();

        let messages = protocol().parse_server_message(&text).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], ServerMessage::Event(BackendEvent::Text(t)) if t == "hello"));
        match &messages[1] {
            ServerMessage::Event(BackendEvent::AudioDelta(frame)) => {
                assert_eq!(frame.sample_rate(), 24000);
                assert_eq!(frame.sample_count(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            messages[2],
            ServerMessage::Event(BackendEvent::TurnComplete)
        ));
    }

    #[test]
    fn test_parse_tool_call_error_and_unknown() {
        let p = protocol();
        let call = p
            .parse_server_message(r#"{"toolCall": {"functionCalls": [{"name": "f"}]}}"#)
            .unwrap();
        assert!(matches!(
            &call[..],
            [ServerMessage::Event(BackendEvent::ToolCall(v))] if v["functionCalls"][0]["name"] == "f"
        ));

        let error = p
            .parse_server_message(r#"{"error": {"code": 400, "message": "bad model"}}"#)
            .unwrap();
        assert!(matches!(
            &error[..],
            [ServerMessage::Event(BackendEvent::Error(e))] if e == "bad model"
        ));

        let unknown = p
            .parse_server_message(r#"{"usageMetadata": {"totalTokenCount": 3}}"#)
            .unwrap();
        assert!(matches!(
            &unknown[..],
            [ServerMessage::Event(BackendEvent::Unknown(k))] if k == "usageMetadata"
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            protocol().parse_server_message("{oops"),
            Err(RealtimeError::SerializationError(_))
        ));
    }

    #[test]
    fn test_rate_from_mime() {
        assert_eq!(rate_from_mime("audio/pcm;rate=24000"), Some(24000));
        assert_eq!(rate_from_mime("audio/pcm; rate=16000"), Some(16000));
        assert_eq!(rate_from_mime("audio/pcm"), None);
    }
}
