//! Telephony media-stream wire format.
//!
//! Every frame is a JSON object with an `event` discriminator. The fields the
//! bridge reads:
//!
//! ```json
//! {"event": "connected", "protocol": "Call", "version": "1.0.0"}
//! {"event": "start", "start": {"streamSid": "MZ...", "callSid": "CA..."}}
//! {"event": "media", "media": {"payload": "<base64 μ-law>"}}
//! {"event": "mark", "mark": {"name": "greeting"}}
//! {"event": "stop"}
//! ```
//!
//! Outbound audio uses the same envelope with a top-level `streamSid`.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::{TelephonyError, TelephonyEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartFrame {
    start: StartPayload,
    /// Some senders repeat the id at the top level
    #[serde(default, alias = "streamId")]
    stream_sid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    #[serde(default, alias = "streamId")]
    stream_sid: Option<String>,
    #[serde(default)]
    call_sid: Option<String>,
    #[serde(default)]
    media_format: Option<MediaFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaFormat {
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    sample_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MediaFrame {
    media: MediaPayload,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct MarkFrame {
    #[serde(default)]
    mark: Option<MarkPayload>,
}

#[derive(Debug, Deserialize)]
struct MarkPayload {
    #[serde(default)]
    name: Option<String>,
}

/// Outbound media frame.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundMedia<'a> {
    event: &'static str,
    stream_sid: &'a str,
    media: OutboundPayload,
}

#[derive(Debug, Serialize)]
struct OutboundPayload {
    payload: String,
}

fn decode_error(event: &str, error: serde_json::Error) -> TelephonyError {
    TelephonyError::Decode(format!("malformed '{event}' frame: {error}"))
}

/// Decode one inbound text frame.
pub fn parse_frame(text: &str) -> Result<TelephonyEvent, TelephonyError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TelephonyError::Decode(format!("invalid JSON: {e}")))?;
    let event = value
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| TelephonyError::Decode("missing 'event' field".to_string()))?
        .to_string();

    match event.as_str() {
        "start" => {
            let frame: StartFrame =
                serde_json::from_value(value).map_err(|e| decode_error("start", e))?;
            if let Some(format) = &frame.start.media_format {
                tracing::debug!(
                    encoding = ?format.encoding,
                    sample_rate = ?format.sample_rate,
                    call_sid = ?frame.start.call_sid,
                    "Media stream format"
                );
            }
            let stream_id = frame
                .start
                .stream_sid
                .or(frame.stream_sid)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    TelephonyError::Decode("'start' frame without a stream id".to_string())
                })?;
            Ok(TelephonyEvent::Start { stream_id })
        }
        "media" => {
            let frame: MediaFrame =
                serde_json::from_value(value).map_err(|e| decode_error("media", e))?;
            let audio = BASE64_STANDARD
                .decode(frame.media.payload.as_bytes())
                .map_err(|e| TelephonyError::Decode(format!("invalid media payload: {e}")))?;
            Ok(TelephonyEvent::Media(Bytes::from(audio)))
        }
        "stop" => Ok(TelephonyEvent::Stop),
        "mark" => {
            let frame: MarkFrame =
                serde_json::from_value(value).map_err(|e| decode_error("mark", e))?;
            Ok(TelephonyEvent::Mark(frame.mark.and_then(|m| m.name)))
        }
        _ => Ok(TelephonyEvent::Unknown(event)),
    }
}

/// Encode one outbound media frame carrying μ-law `payload`.
pub fn encode_media(stream_id: &str, payload: &[u8]) -> Result<String, TelephonyError> {
    serde_json::to_string(&OutboundMedia {
        event: "media",
        stream_sid: stream_id,
        media: OutboundPayload {
            payload: BASE64_STANDARD.encode(payload),
        },
    })
    .map_err(|e| TelephonyError::Send(e.to_string()))
}
