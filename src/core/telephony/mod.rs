//! Telephony media-stream channel adapter.
//!
//! Translates the telephony provider's JSON-over-WebSocket media stream into
//! typed [`TelephonyEvent`]s and writes μ-law audio back in the same format.

mod channel;
mod events;
mod messages;

pub use channel::{TelephonyReceiver, TelephonySender};
pub use events::{TelephonyError, TelephonyEvent};
pub use messages::{encode_media, parse_frame};
