//! Audio codec layer.
//!
//! Pure transforms between telephony μ-law at 8kHz and the PCM16 streams the
//! realtime backends speak. Nothing here performs I/O; the only state carried
//! between calls is the explicit [`ResampleState`] token owned by each relay
//! direction.

pub mod codec;
mod frame;
pub mod resample;

pub use codec::{decode_mulaw, encode_mulaw, linear_to_mulaw, mulaw_to_linear, rms};
pub use frame::{AudioEncoding, AudioFrame, TELEPHONY_SAMPLE_RATE};
pub use resample::{ResampleState, StreamResampler, resample};
