//! Shared WebSocket driver for realtime backends.
//!
//! [`connect`] performs the vendor-neutral part of `open`: dial, send setup,
//! wait (bounded) for the acknowledgement, inject the initial prompt and hand
//! the socket to a spawned task. The task owns the socket; the bridge talks to
//! it through a [`BackendSender`] (outbound audio) and [`BackendEvents`]
//! (inbound typed events), so the two relay directions never contend on a lock.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::base::{
    BackendConfig, BackendEvent, CloseReason, HandshakeOutcome, HandshakePolicy, RealtimeError,
    RealtimeProtocol, RealtimeResult, ServerMessage,
};
use crate::core::audio::{AudioEncoding, AudioFrame};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded backend events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the driver to flush and say goodbye.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a connection using `protocol` for the wire format.
pub async fn connect(
    protocol: Arc<dyn RealtimeProtocol>,
    config: &BackendConfig,
) -> RealtimeResult<BackendConnection> {
    config.validate()?;

    let request = protocol.connect_request()?;
    let (mut ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(map_connect_error)?;

    info!(provider = %protocol.provider(), "Connected to realtime backend");

    let setup = protocol.setup_message()?;
    ws_stream
        .send(Message::Text(setup.into()))
        .await
        .map_err(|e| RealtimeError::ConnectionFailed(format!("failed to send setup: {e}")))?;

    let mut early_events = Vec::new();
    let handshake = match tokio::time::timeout(
        config.handshake_timeout,
        await_setup(&mut ws_stream, protocol.as_ref(), &mut early_events),
    )
    .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return Err(e),
        Err(_) => match config.handshake_policy {
            HandshakePolicy::Continue => {
                warn!(
                    timeout = ?config.handshake_timeout,
                    "Setup acknowledgement not received, continuing anyway"
                );
                HandshakeOutcome::TimedOut
            }
            HandshakePolicy::Abort => {
                let _ = ws_stream.close(None).await;
                return Err(RealtimeError::HandshakeTimeout(config.handshake_timeout));
            }
        },
    };

    match &handshake {
        HandshakeOutcome::Confirmed => info!("Backend setup confirmed"),
        HandshakeOutcome::Rejected(detail) => {
            warn!(error = %detail, "Backend rejected setup, continuing anyway")
        }
        HandshakeOutcome::TimedOut => {}
    }

    if let Some(prompt) = config.initial_prompt.as_deref().filter(|p| !p.is_empty()) {
        for message in protocol.prompt_messages(prompt)? {
            ws_stream
                .send(Message::Text(message.into()))
                .await
                .map_err(|e| {
                    RealtimeError::ConnectionFailed(format!("failed to send initial prompt: {e}"))
                })?;
        }
        debug!("Initial prompt sent");
    }

    let (out_tx, out_rx) = mpsc::channel::<String>(WS_CHANNEL_CAPACITY);
    // Sized so every event queued during setup fits before the driver starts
    let capacity = EVENT_CHANNEL_CAPACITY.max(early_events.len() + 1);
    let (events_tx, events_rx) = mpsc::channel::<BackendEvent>(capacity);
    let shutdown = CancellationToken::new();

    debug!(count = early_events.len(), "Replaying events received during setup");
    for event in early_events {
        if events_tx.send(event).await.is_err() {
            break;
        }
    }

    let task = tokio::spawn(drive(
        ws_stream,
        out_rx,
        events_tx,
        shutdown.clone(),
        protocol.clone(),
    ));

    Ok(BackendConnection {
        sender: BackendSender {
            tx: out_tx,
            protocol,
            input_sample_rate: config.input_sample_rate,
        },
        events: Some(BackendEvents {
            rx: events_rx,
            finished: false,
        }),
        shutdown,
        task: Some(task),
        handshake,
        output_sample_rate: config.output_sample_rate,
    })
}

fn map_connect_error(error: tungstenite::Error) -> RealtimeError {
    match &error {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            RealtimeError::AuthenticationFailed(format!(
                "backend refused credentials: HTTP {}",
                response.status()
            ))
        }
        _ => RealtimeError::ConnectionFailed(error.to_string()),
    }
}

/// Read until the setup acknowledgement, buffering anything that arrives first.
async fn await_setup<S>(
    stream: &mut S,
    protocol: &dyn RealtimeProtocol,
    early_events: &mut Vec<BackendEvent>,
) -> RealtimeResult<HandshakeOutcome>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Ignoring non-UTF-8 binary message during setup");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                return Err(RealtimeError::ConnectionFailed(format!(
                    "backend closed the connection during setup: {frame:?}"
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(RealtimeError::ConnectionFailed(e.to_string())),
        };

        let messages = match protocol.parse_server_message(&text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Failed to parse message during setup");
                continue;
            }
        };

        let mut outcome = None;
        for message in messages {
            match message {
                ServerMessage::SetupComplete => outcome = Some(HandshakeOutcome::Confirmed),
                ServerMessage::Event(BackendEvent::Error(detail)) if outcome.is_none() => {
                    early_events.push(BackendEvent::Error(detail.clone()));
                    outcome = Some(HandshakeOutcome::Rejected(detail));
                }
                ServerMessage::Event(event) => early_events.push(event),
                ServerMessage::Ignored(kind) => trace!(kind = %kind, "Ignoring setup message"),
            }
        }
        if let Some(outcome) = outcome {
            return Ok(outcome);
        }
    }

    Err(RealtimeError::ConnectionFailed(
        "backend closed the connection during setup".to_string(),
    ))
}

/// Connection task: forwards outbound messages and decodes inbound ones.
///
/// Always ends by emitting exactly one `BackendEvent::Closed`.
async fn drive(
    ws_stream: WsStream,
    mut out_rx: mpsc::Receiver<String>,
    events_tx: mpsc::Sender<BackendEvent>,
    shutdown: CancellationToken,
    protocol: Arc<dyn RealtimeProtocol>,
) {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            biased;

            // Outbound first so queued audio is never starved by inbound traffic
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(json) => {
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!(error = %e, "Failed to send WebSocket message");
                            break CloseReason::Error(e.to_string());
                        }
                    }
                    // Every sender dropped: nobody can talk to the backend anymore
                    None => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break CloseReason::Local;
                    }
                }
            }

            _ = shutdown.cancelled() => {
                out_rx.close();
                while let Some(json) = out_rx.recv().await {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sink.send(Message::Close(None)).await;
                break CloseReason::Local;
            }

            incoming = ws_stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!(len = data.len(), "Ignoring non-UTF-8 binary message");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send pong");
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Backend closed the connection");
                        break CloseReason::Remote;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "Backend WebSocket error");
                        break CloseReason::Error(e.to_string());
                    }
                    None => break CloseReason::Remote,
                };

                match protocol.parse_server_message(&text) {
                    Ok(messages) => {
                        for message in messages {
                            match message {
                                ServerMessage::Event(event) => {
                                    // Receiver gone means the bridge stopped listening
                                    let _ = events_tx.send(event).await;
                                }
                                ServerMessage::SetupComplete => {
                                    trace!("Late setup acknowledgement");
                                }
                                ServerMessage::Ignored(kind) => {
                                    trace!(kind = %kind, "Ignoring backend message");
                                }
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to parse backend message"),
                }
            }
        }
    };

    debug!(reason = %reason, "Backend connection task finished");
    let _ = events_tx.send(BackendEvent::Closed(reason)).await;
}

// =============================================================================
// Handles
// =============================================================================

/// Outbound half of an open backend connection. Cheap to clone.
#[derive(Clone)]
pub struct BackendSender {
    tx: mpsc::Sender<String>,
    protocol: Arc<dyn RealtimeProtocol>,
    input_sample_rate: u32,
}

impl BackendSender {
    /// Forward one PCM16 frame at the backend input rate.
    ///
    /// `InvalidFrame` and `SerializationError` concern only this frame;
    /// `ConnectionClosed` means the connection is gone.
    pub async fn send_audio(&self, frame: &AudioFrame) -> RealtimeResult<()> {
        if frame.encoding() != AudioEncoding::Linear16 {
            return Err(RealtimeError::InvalidFrame(format!(
                "expected linear16, got {}",
                frame.encoding()
            )));
        }
        if frame.sample_rate() != self.input_sample_rate {
            return Err(RealtimeError::InvalidFrame(format!(
                "expected {}Hz, got {}Hz",
                self.input_sample_rate,
                frame.sample_rate()
            )));
        }
        if frame.is_empty() {
            return Ok(());
        }

        let message = self.protocol.audio_message(frame.data())?;
        self.tx
            .send(message)
            .await
            .map_err(|_| RealtimeError::ConnectionClosed)
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Inbound half of an open backend connection.
///
/// A single-consumer sequence: `next` yields events in arrival order and
/// returns `None` once `Closed` has been delivered.
pub struct BackendEvents {
    rx: mpsc::Receiver<BackendEvent>,
    finished: bool,
}

impl BackendEvents {
    pub async fn next(&mut self) -> Option<BackendEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(BackendEvent::Closed(reason)) => {
                self.finished = true;
                Some(BackendEvent::Closed(reason))
            }
            Some(event) => Some(event),
            None => {
                // Driver ended without its terminal event (aborted)
                self.finished = true;
                Some(BackendEvent::Closed(CloseReason::Error(
                    "connection task ended unexpectedly".to_string(),
                )))
            }
        }
    }
}

/// An open backend connection.
pub struct BackendConnection {
    sender: BackendSender,
    events: Option<BackendEvents>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    handshake: HandshakeOutcome,
    output_sample_rate: u32,
}

impl BackendConnection {
    pub fn sender(&self) -> BackendSender {
        self.sender.clone()
    }

    /// Take the event sequence. It can be taken once.
    pub fn take_events(&mut self) -> Option<BackendEvents> {
        self.events.take()
    }

    pub async fn send_audio(&self, frame: &AudioFrame) -> RealtimeResult<()> {
        self.sender.send_audio(frame).await
    }

    pub fn handshake(&self) -> &HandshakeOutcome {
        &self.handshake
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.sender.input_sample_rate
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none() || self.sender.is_closed()
    }

    /// Release the connection. Idempotent; never fails.
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
                Ok(Ok(())) => debug!("Backend connection closed"),
                Ok(Err(e)) => warn!(error = %e, "Backend connection task failed"),
                Err(_) => {
                    warn!("Backend connection did not close in time, aborting");
                    task.abort();
                }
            }
        }
    }
}

impl Drop for BackendConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("handshake", &self.handshake)
            .field("input_sample_rate", &self.sender.input_sample_rate)
            .field("output_sample_rate", &self.output_sample_rate)
            .field("closed", &self.is_closed())
            .finish()
    }
}
