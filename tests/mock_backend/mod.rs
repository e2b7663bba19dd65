//! Mock realtime backend server
//!
//! Speaks just enough of the Gemini Live and OpenAI Realtime wire formats to
//! exercise the bridge end to end:
//! - setup acknowledgement (confirmed, silent or rejected)
//! - audio replies after the first caller audio chunk
//! - scripted non-audio replies (turn complete, tool calls, errors)
//! - a burst of server events before the setup acknowledgement
//! - abrupt connection drops (no close frame)
//!
//! Every text frame the client sends is recorded as JSON for assertions.

// Allow dead code in test infrastructure - each test binary uses a subset
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Which vendor dialect the mock speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Gemini,
    OpenAI,
}

/// How the mock answers the setup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Confirm,
    /// Never acknowledge
    Silent,
    /// Answer setup with a vendor error
    Reject,
}

#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    pub flavor: Flavor,
    pub ack: AckMode,
    /// PCM16 LE sent as one audio event once the first caller audio arrives
    pub audio_reply: Option<Vec<u8>>,
    /// Raw server messages sent after the first caller audio chunk
    pub extra_replies: Vec<Value>,
    /// Text events sent between receiving setup and acknowledging it
    pub early_events: usize,
    /// Drop the TCP connection after this many caller audio messages
    pub drop_after_audio: Option<usize>,
}

impl MockBackendConfig {
    pub fn gemini() -> Self {
        Self {
            flavor: Flavor::Gemini,
            ack: AckMode::Confirm,
            audio_reply: None,
            extra_replies: Vec::new(),
            early_events: 0,
            drop_after_audio: None,
        }
    }

    pub fn openai() -> Self {
        Self {
            flavor: Flavor::OpenAI,
            ..Self::gemini()
        }
    }

    pub fn with_ack(mut self, ack: AckMode) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_audio_reply(mut self, pcm16: Vec<u8>) -> Self {
        self.audio_reply = Some(pcm16);
        self
    }

    pub fn with_extra_replies(mut self, replies: Vec<Value>) -> Self {
        self.extra_replies = replies;
        self
    }

    pub fn with_early_events(mut self, count: usize) -> Self {
        self.early_events = count;
        self
    }

    pub fn drop_after_audio(mut self, count: usize) -> Self {
        self.drop_after_audio = Some(count);
        self
    }
}

struct MockState {
    config: MockBackendConfig,
    received: Mutex<Vec<Value>>,
    connections: AtomicU64,
    closes: AtomicU64,
}

/// Handle to a running mock backend.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start(config: MockBackendConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            config,
            received: Mutex::new(Vec::new()),
            connections: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        });

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Mock backend connection error: {e}");
                    }
                });
            }
        });

        Self { addr, state }
    }

    /// WebSocket endpoint to use as the backend endpoint override.
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn connections(&self) -> u64 {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Close frames received from the client.
    pub fn closes(&self) -> u64 {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    /// Caller audio messages, in arrival order.
    pub fn audio_messages(&self) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|msg| is_audio_message(msg))
            .collect()
    }

    /// Decoded PCM16 LE payload of every caller audio message.
    pub fn audio_payloads(&self) -> Vec<Vec<u8>> {
        self.audio_messages()
            .iter()
            .filter_map(audio_payload)
            .collect()
    }

    /// Poll until `count` audio messages have arrived.
    pub async fn wait_for_audio(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.audio_messages().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.audio_messages().len() >= count
    }

    /// Poll until `count` text messages of any kind have arrived.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.received().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received().len() >= count
    }
}

fn is_audio_message(msg: &Value) -> bool {
    msg.get("realtimeInput").is_some()
        || msg.get("type").and_then(Value::as_str) == Some("input_audio_buffer.append")
}

fn audio_payload(msg: &Value) -> Option<Vec<u8>> {
    let data = msg
        .pointer("/realtimeInput/mediaChunks/0/data")
        .or_else(|| msg.get("audio"))
        .and_then(Value::as_str)?;
    BASE64_STANDARD.decode(data).ok()
}

fn ack_message(flavor: Flavor) -> Value {
    match flavor {
        Flavor::Gemini => json!({ "setupComplete": {} }),
        Flavor::OpenAI => json!({
            "type": "session.updated",
            "event_id": "evt_mock_1",
            "session": { "id": "sess_mock", "object": "realtime.session" }
        }),
    }
}

fn reject_message(flavor: Flavor) -> Value {
    match flavor {
        Flavor::Gemini => json!({
            "error": { "code": 400, "message": "model not found", "status": "INVALID_ARGUMENT" }
        }),
        Flavor::OpenAI => json!({
            "type": "error",
            "event_id": "evt_mock_err",
            "error": {
                "type": "invalid_request_error",
                "code": "model_not_found",
                "message": "model not found"
            }
        }),
    }
}

/// Model text, numbered so ordering can be checked.
fn text_message(flavor: Flavor, index: usize) -> Value {
    let text = format!("early {index}");
    match flavor {
        Flavor::Gemini => json!({
            "serverContent": { "modelTurn": { "parts": [{ "text": text }] } }
        }),
        Flavor::OpenAI => json!({
            "type": "response.text.done",
            "event_id": format!("evt_early_{index}"),
            "text": text
        }),
    }
}

fn audio_messages(flavor: Flavor, pcm16: &[u8]) -> Vec<Value> {
    let data = BASE64_STANDARD.encode(pcm16);
    match flavor {
        Flavor::Gemini => vec![
            json!({
                "serverContent": {
                    "modelTurn": {
                        "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": data } }]
                    }
                }
            }),
            json!({ "serverContent": { "turnComplete": true } }),
        ],
        Flavor::OpenAI => vec![
            json!({
                "type": "response.audio.delta",
                "event_id": "evt_mock_2",
                "response_id": "resp_1",
                "item_id": "item_1",
                "output_index": 0,
                "content_index": 0,
                "delta": data
            }),
            json!({ "type": "response.done", "event_id": "evt_mock_3", "response": {} }),
        ],
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    state.connections.fetch_add(1, Ordering::SeqCst);

    let flavor = state.config.flavor;
    let mut setup_seen = false;
    let mut audio_count = 0usize;
    let mut replied = false;

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => {
                state.closes.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
                continue;
            }
            Ok(_) => continue,
            Err(_) => break,
        };

        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        state.received.lock().push(value.clone());

        if !setup_seen {
            setup_seen = true;
            for index in 0..state.config.early_events {
                write
                    .send(Message::Text(text_message(flavor, index).to_string().into()))
                    .await?;
            }
            match state.config.ack {
                AckMode::Confirm => {
                    write
                        .send(Message::Text(ack_message(flavor).to_string().into()))
                        .await?
                }
                AckMode::Reject => {
                    write
                        .send(Message::Text(reject_message(flavor).to_string().into()))
                        .await?
                }
                AckMode::Silent => {}
            }
            continue;
        }

        if is_audio_message(&value) {
            audio_count += 1;

            if !replied {
                replied = true;
                if let Some(pcm16) = state.config.audio_reply.as_ref() {
                    for reply in audio_messages(flavor, pcm16) {
                        write.send(Message::Text(reply.to_string().into())).await?;
                    }
                }
                for reply in &state.config.extra_replies {
                    write.send(Message::Text(reply.to_string().into())).await?;
                }
            }

            if state
                .config
                .drop_after_audio
                .is_some_and(|limit| audio_count >= limit)
            {
                // Dropping both halves resets the socket without a close frame
                return Ok(());
            }
        }
    }

    Ok(())
}
