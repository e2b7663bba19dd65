//! Call-answer responder.
//!
//! The telephony provider requests `/incoming-call` when a call arrives. The
//! reply tells it to play a greeting, pause, then open a media stream to our
//! `/media-stream` WebSocket.

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Path of the media-stream WebSocket route
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Incoming call webhook (`GET` or `POST`)
///
/// The stream host is `PUBLIC_HOST` when configured, otherwise the request's
/// `Host` header. Fails with 400 when neither is available.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let host = state
        .config
        .public_host
        .as_deref()
        .map(normalize_host)
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(normalize_host)
        })
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::BadRequest("cannot determine public host".to_string()))?;

    let stream_url = format!("wss://{host}{MEDIA_STREAM_PATH}");
    info!(%stream_url, "Answering incoming call");

    let body = render_twiml(state.config.greeting.as_deref(), &stream_url)?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], body).into_response())
}

/// Strip any scheme and trailing slash from a configured or requested host.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .or_else(|| host.strip_prefix("wss://"))
        .or_else(|| host.strip_prefix("ws://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}

/// Build the TwiML document: optional greeting, one second pause, stream connect.
pub fn render_twiml(greeting: Option<&str>, stream_url: &str) -> AppResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(twiml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("Response")))
        .map_err(twiml_error)?;

    if let Some(greeting) = greeting.filter(|g| !g.trim().is_empty()) {
        writer
            .write_event(Event::Start(BytesStart::new("Say")))
            .map_err(twiml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(greeting)))
            .map_err(twiml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("Say")))
            .map_err(twiml_error)?;
    }

    let mut pause = BytesStart::new("Pause");
    pause.push_attribute(("length", "1"));
    writer.write_event(Event::Empty(pause)).map_err(twiml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("Connect")))
        .map_err(twiml_error)?;
    let mut stream = BytesStart::new("Stream");
    stream.push_attribute(("url", stream_url));
    writer.write_event(Event::Empty(stream)).map_err(twiml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("Connect")))
        .map_err(twiml_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("Response")))
        .map_err(twiml_error)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(twiml_error)
}

fn twiml_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("failed to render TwiML: {e}"))
}
