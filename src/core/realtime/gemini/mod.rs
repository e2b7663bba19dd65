//! Gemini Live API module.
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian at 16kHz
//! - Output: PCM 16-bit signed little-endian at 24kHz
//!
//! # Supported Voices
//!
//! Puck (default), Charon, Kore, Fenrir, Aoede, Leda, Orus, Zephyr

mod client;
mod config;
mod messages;

pub use client::GeminiLive;
pub use config::{
    GEMINI_DEFAULT_MODEL, GEMINI_DEFAULT_VOICE, GEMINI_INPUT_SAMPLE_RATE, GEMINI_LIVE_URL,
    GEMINI_OUTPUT_SAMPLE_RATE, pcm_mime_type,
};
pub use messages::{ClientMessage, ServerMessage as GeminiServerMessage};
