//! Bridge orchestrator: one telephony channel ⇄ one realtime backend.
//!
//! Each accepted call runs two relay tasks:
//!
//! - inbound: telephony events → μ-law decode → resample to the backend input
//!   rate → `send_audio`
//! - outbound: backend events → resample to 8kHz → μ-law encode → `send_media`
//!
//! Whichever task finishes first cancels the session token; the other stops at
//! its next suspension point. Sends are suspension points too: a frame that is
//! mid-send when the token fires gets a short grace period, then is abandoned,
//! so a peer that stops reading cannot hold the session open. Teardown order is
//! fixed: join both tasks, close the backend, close the telephony channel, mark
//! the session `Closed`.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::BridgeError;
use super::observer::{BridgeEvent, BridgeObserver, Direction, TracingObserver};
use super::session::{CallSession, SessionHandle, SessionSummary};
use crate::core::audio::{AudioFrame, StreamResampler, TELEPHONY_SAMPLE_RATE, rms};
use crate::core::realtime::{
    BackendConfig, BackendEvent, BackendEvents, BackendSender, BaseRealtime,
};
use crate::core::telephony::{TelephonyEvent, TelephonyReceiver, TelephonySender};

/// Caller energy above this is logged at debug level.
const INPUT_ENERGY_LOG_THRESHOLD: u32 = 1000;

/// How long an in-flight send may continue once the session is closing.
const IN_FLIGHT_GRACE: Duration = Duration::from_millis(500);

/// Accepts telephony channels and bridges each to a fresh backend connection.
#[derive(Clone)]
pub struct Bridge {
    backend: Arc<dyn BaseRealtime>,
    config: BackendConfig,
    observer: Arc<dyn BridgeObserver>,
}

impl Bridge {
    pub fn new(backend: Arc<dyn BaseRealtime>, config: BackendConfig) -> Self {
        Self {
            backend,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BridgeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Run one call to completion.
    ///
    /// Returns once both directions have stopped and every resource is
    /// released. Never fails: failures end the session and show up in the
    /// summary and the observer.
    pub async fn accept<R, E, W>(
        &self,
        receiver: TelephonyReceiver<R>,
        mut sender: TelephonySender<W>,
    ) -> SessionSummary
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display + Send,
    {
        let mut session = CallSession::new();
        let handle = session.handle();
        self.observer.on_event(&handle, &BridgeEvent::SessionStarted);

        let mut connection = match self.backend.open(&self.config).await {
            Ok(connection) => connection,
            Err(e) => {
                self.observer
                    .on_event(&handle, &BridgeEvent::BackendConnectFailed(e.into()));
                sender.close().await;
                return self.finish(&mut session);
            }
        };
        self.observer.on_event(
            &handle,
            &BridgeEvent::Handshake(connection.handshake().clone()),
        );

        let backend_tx = connection.sender();
        let output_rate = connection.output_sample_rate();
        let events = connection.take_events();
        session.attach_backend(connection);

        let Some(events) = events else {
            error!(call_id = %handle.call_id(), "Backend event stream already taken");
            session.release_backend().await;
            sender.close().await;
            return self.finish(&mut session);
        };

        let inbound = tokio::spawn(pump_inbound(
            handle.clone(),
            receiver,
            backend_tx,
            self.observer.clone(),
        ));
        let outbound = tokio::spawn(pump_outbound(
            handle.clone(),
            events,
            sender,
            output_rate,
            self.observer.clone(),
        ));

        let (inbound, outbound) = tokio::join!(inbound, outbound);
        if let Err(e) = inbound {
            error!(call_id = %handle.call_id(), error = %e, "Inbound relay task failed");
        }
        let sender = match outbound {
            Ok(sender) => Some(sender),
            Err(e) => {
                error!(call_id = %handle.call_id(), error = %e, "Outbound relay task failed");
                None
            }
        };

        session.release_backend().await;
        if let Some(mut sender) = sender {
            sender.close().await;
        }
        self.finish(&mut session)
    }

    fn finish(&self, session: &mut CallSession) -> SessionSummary {
        session.mark_closed();
        let summary = session.summary();
        self.observer.on_event(
            &session.handle(),
            &BridgeEvent::SessionClosed(summary.clone()),
        );
        summary
    }
}

/// Telephony → backend.
async fn pump_inbound<R, E>(
    session: SessionHandle,
    mut receiver: TelephonyReceiver<R>,
    backend: BackendSender,
    observer: Arc<dyn BridgeObserver>,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let cancel = session.cancellation();
    let mut resampler = StreamResampler::new(TELEPHONY_SAMPLE_RATE, backend.input_sample_rate());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => next,
        };

        let event = match next {
            None => {
                debug!(call_id = %session.call_id(), "Telephony channel closed");
                break;
            }
            Some(Err(e)) => {
                let fatal = e.is_fatal();
                observer.on_event(&session, &BridgeEvent::DecodeFailed(e));
                if fatal {
                    break;
                }
                continue;
            }
            Some(Ok(event)) => event,
        };

        match event {
            TelephonyEvent::Start { stream_id } => {
                if session.publish_stream_id(stream_id.clone()) {
                    observer.on_event(&session, &BridgeEvent::StreamStarted { stream_id });
                } else {
                    debug!(call_id = %session.call_id(), %stream_id, "Ignoring repeated start");
                }
            }
            TelephonyEvent::Media(payload) => {
                if session.stream_id().is_none() {
                    session.record_dropped();
                    observer.on_event(
                        &session,
                        &BridgeEvent::FrameDropped {
                            direction: Direction::Inbound,
                            reason: "media before start",
                        },
                    );
                    continue;
                }

                let frame =
                    AudioFrame::mulaw(payload, TELEPHONY_SAMPLE_RATE).resampled(&mut resampler);
                let energy = rms(&frame.samples());
                if energy > INPUT_ENERGY_LOG_THRESHOLD {
                    debug!(call_id = %session.call_id(), rms = energy, "Caller audio energy");
                }

                let Some(result) = send_or_cancel(&cancel, backend.send_audio(&frame)).await
                else {
                    abandon_in_flight(&session, observer.as_ref(), Direction::Inbound);
                    break;
                };
                match result {
                    Ok(()) => session.record_in(),
                    Err(e) => {
                        let error = BridgeError::from(e);
                        let fatal = error.is_fatal();
                        session.record_dropped();
                        observer.on_event(
                            &session,
                            &BridgeEvent::SendFailed {
                                direction: Direction::Inbound,
                                error,
                            },
                        );
                        if fatal {
                            break;
                        }
                    }
                }
            }
            TelephonyEvent::Stop => {
                info!(call_id = %session.call_id(), "Telephony stream stopped");
                break;
            }
            TelephonyEvent::Mark(name) => {
                debug!(call_id = %session.call_id(), mark = ?name, "Telephony mark");
            }
            TelephonyEvent::Unknown(tag) => {
                debug!(call_id = %session.call_id(), event = %tag, "Ignoring telephony event");
            }
        }
    }

    session.begin_closing();
}

/// Backend → telephony. Hands the sender back for teardown.
async fn pump_outbound<W>(
    session: SessionHandle,
    mut events: BackendEvents,
    mut sender: TelephonySender<W>,
    output_rate: u32,
    observer: Arc<dyn BridgeObserver>,
) -> TelephonySender<W>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let cancel = session.cancellation();
    let mut resampler = StreamResampler::new(output_rate, TELEPHONY_SAMPLE_RATE);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = events.next() => next,
        };

        let Some(event) = next else {
            break;
        };

        match event {
            BackendEvent::AudioDelta(frame) => {
                let Some(stream_id) = session.stream_id() else {
                    session.record_dropped();
                    observer.on_event(
                        &session,
                        &BridgeEvent::FrameDropped {
                            direction: Direction::Outbound,
                            reason: "stream id not yet known",
                        },
                    );
                    continue;
                };

                if frame.sample_rate() != resampler.in_rate() {
                    debug!(
                        from = resampler.in_rate(),
                        to = frame.sample_rate(),
                        "Backend output rate changed"
                    );
                    resampler = StreamResampler::new(frame.sample_rate(), TELEPHONY_SAMPLE_RATE);
                }
                let narrow = frame.resampled(&mut resampler).to_mulaw();
                if narrow.is_empty() {
                    continue;
                }

                let Some(result) =
                    send_or_cancel(&cancel, sender.send_media(stream_id, narrow.data())).await
                else {
                    abandon_in_flight(&session, observer.as_ref(), Direction::Outbound);
                    break;
                };
                match result {
                    Ok(()) => session.record_out(),
                    Err(e) => {
                        let error = BridgeError::from(e);
                        let fatal = error.is_fatal();
                        session.record_dropped();
                        observer.on_event(
                            &session,
                            &BridgeEvent::SendFailed {
                                direction: Direction::Outbound,
                                error,
                            },
                        );
                        if fatal {
                            break;
                        }
                    }
                }
            }
            BackendEvent::Closed(reason) => {
                observer.on_event(
                    &session,
                    &BridgeEvent::Backend {
                        kind: "closed",
                        detail: Some(reason.to_string()),
                    },
                );
                break;
            }
            other => {
                let kind = other.kind();
                let detail = match other {
                    BackendEvent::Text(text) => Some(text),
                    BackendEvent::ToolCall(call) => Some(call.to_string()),
                    BackendEvent::Error(detail) => Some(detail),
                    BackendEvent::Unknown(tag) => Some(tag),
                    _ => None,
                };
                observer.on_event(&session, &BridgeEvent::Backend { kind, detail });
            }
        }
    }

    session.begin_closing();
    sender
}

/// Drive one send, yielding to session cancellation.
///
/// Returns `None` when the session started closing and the send did not finish
/// within [`IN_FLIGHT_GRACE`].
async fn send_or_cancel<F, T>(cancel: &CancellationToken, send: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::pin!(send);
    tokio::select! {
        biased;
        result = &mut send => return Some(result),
        _ = cancel.cancelled() => {}
    }
    tokio::time::timeout(IN_FLIGHT_GRACE, send).await.ok()
}

fn abandon_in_flight(session: &SessionHandle, observer: &dyn BridgeObserver, direction: Direction) {
    warn!(call_id = %session.call_id(), %direction, "Peer stalled during teardown, abandoning frame");
    session.record_dropped();
    observer.on_event(
        session,
        &BridgeEvent::FrameDropped {
            direction,
            reason: "peer stalled while closing",
        },
    );
}
