//! OpenAI Realtime API module.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    OPENAI_AUDIO_FORMAT, OPENAI_DEFAULT_MODEL, OPENAI_DEFAULT_VOICE, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL,
};
pub use messages::{ClientEvent, ServerEvent, SessionConfig};
