//! Typed halves of a telephony media-stream WebSocket.
//!
//! Both halves are generic over the underlying `Stream`/`Sink` of axum
//! WebSocket messages so the bridge can run against a split `WebSocket` in
//! production and against in-memory channels in tests.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, warn};

use super::events::{TelephonyError, TelephonyEvent};
use super::messages::{encode_media, parse_frame};

/// Bound on handing the close frame to a peer that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Inbound half: decodes frames into [`TelephonyEvent`]s.
pub struct TelephonyReceiver<S> {
    stream: S,
    closed: bool,
}

impl<S, E> TelephonyReceiver<S>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Next event, a per-frame decode error, or `None` once the channel closed.
    ///
    /// Control frames are consumed silently.
    pub async fn recv(&mut self) -> Option<Result<TelephonyEvent, TelephonyError>> {
        if self.closed {
            return None;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(parse_frame(text.as_str())),
                Some(Ok(Message::Binary(data))) => {
                    return Some(match std::str::from_utf8(&data) {
                        Ok(text) => parse_frame(text),
                        Err(_) => Err(TelephonyError::Decode(
                            "binary frame is not UTF-8 JSON".to_string(),
                        )),
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Telephony peer sent close");
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "Telephony socket error");
                    self.closed = true;
                    return None;
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }
}

/// Outbound half: writes media frames and closes the channel.
pub struct TelephonySender<S> {
    sink: S,
    closed: bool,
}

impl<S> TelephonySender<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    /// Send one μ-law payload tagged with `stream_id`.
    pub async fn send_media(&mut self, stream_id: &str, payload: &[u8]) -> Result<(), TelephonyError> {
        if self.closed {
            return Err(TelephonyError::ChannelClosed);
        }
        if stream_id.is_empty() {
            return Err(TelephonyError::StreamNotStarted);
        }

        let json = encode_media(stream_id, payload)?;
        if let Err(e) = self.sink.send(Message::Text(json.into())).await {
            debug!(error = %e, "Telephony sink rejected frame");
            self.closed = true;
            return Err(TelephonyError::ChannelClosed);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send a close frame. Idempotent; gives up after [`CLOSE_TIMEOUT`].
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let sink = &mut self.sink;
        let shutdown = async move {
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!(error = %e, "Telephony channel already gone");
            }
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Telephony channel close failed");
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            warn!("Telephony channel did not accept close in time");
        }
    }
}
