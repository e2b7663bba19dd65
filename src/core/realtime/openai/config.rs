//! OpenAI Realtime API connection defaults.

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// PCM16 rate for both input and output.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Model used when none is configured.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Voice used when none is configured.
pub const OPENAI_DEFAULT_VOICE: &str = "alloy";

/// Wire name of the audio format in both directions.
pub const OPENAI_AUDIO_FORMAT: &str = "pcm16";
