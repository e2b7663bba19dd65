//! Gemini Live API connection defaults.

/// Gemini Live bidirectional streaming endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Native-audio model used when none is configured.
pub const GEMINI_DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// PCM16 rate Gemini Live accepts.
pub const GEMINI_INPUT_SAMPLE_RATE: u32 = 16000;

/// PCM16 rate Gemini Live produces.
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Prebuilt voice used when none is configured.
pub const GEMINI_DEFAULT_VOICE: &str = "Puck";

/// MIME type for a PCM16 chunk at `rate`.
pub fn pcm_mime_type(rate: u32) -> String {
    format!("audio/pcm;rate={rate}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type() {
        assert_eq!(pcm_mime_type(16000), "audio/pcm;rate=16000");
    }
}
