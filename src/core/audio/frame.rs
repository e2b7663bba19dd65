//! Immutable audio frame value shared by both relay directions.

use bytes::Bytes;

use super::codec::{decode_mulaw, encode_mulaw, pcm16_from_le_bytes, pcm16_to_le_bytes};
use super::resample::StreamResampler;

/// Telephony narrowband sample rate.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Sample encoding carried by an [`AudioFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// G.711 μ-law, one byte per sample
    Mulaw,
    /// PCM 16-bit signed little-endian, two bytes per sample
    Linear16,
}

impl AudioEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioEncoding::Mulaw => 1,
            AudioEncoding::Linear16 => 2,
        }
    }
}

impl std::fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioEncoding::Mulaw => write!(f, "mulaw"),
            AudioEncoding::Linear16 => write!(f, "linear16"),
        }
    }
}

/// One chunk of mono audio. Transforms return new frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Bytes,
    sample_rate: u32,
    encoding: AudioEncoding,
    channels: u16,
}

impl AudioFrame {
    /// μ-law frame, as carried by telephony media events.
    pub fn mulaw(data: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            encoding: AudioEncoding::Mulaw,
            channels: 1,
        }
    }

    /// Little-endian PCM16 frame, as exchanged with realtime backends.
    pub fn linear16(data: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            encoding: AudioEncoding::Linear16,
            channels: 1,
        }
    }

    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        Self::linear16(pcm16_to_le_bytes(samples), sample_rate)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / self.encoding.bytes_per_sample()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear samples regardless of the stored encoding.
    pub fn samples(&self) -> Vec<i16> {
        match self.encoding {
            AudioEncoding::Mulaw => decode_mulaw(&self.data),
            AudioEncoding::Linear16 => pcm16_from_le_bytes(&self.data),
        }
    }

    /// Compress to μ-law at the same rate. μ-law frames are returned as-is.
    pub fn to_mulaw(&self) -> AudioFrame {
        match self.encoding {
            AudioEncoding::Mulaw => self.clone(),
            AudioEncoding::Linear16 => Self::mulaw(
                encode_mulaw(&pcm16_from_le_bytes(&self.data)),
                self.sample_rate,
            ),
        }
    }

    /// Convert to the resampler's output rate as PCM16.
    ///
    /// The frame must already be at the resampler's input rate. The caller
    /// owns the resampler so continuity is kept per stream direction.
    pub fn resampled(&self, resampler: &mut StreamResampler) -> AudioFrame {
        let samples = resampler.process(&self.samples());
        Self::from_samples(&samples, resampler.out_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mulaw_frame_counts() {
        let frame = AudioFrame::mulaw(vec![0xFFu8; 160], TELEPHONY_SAMPLE_RATE);
        assert_eq!(frame.encoding(), AudioEncoding::Mulaw);
        assert_eq!(frame.sample_count(), 160);
        assert_eq!(frame.channels(), 1);
        assert!(frame.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mulaw_conversion_produces_new_frame() {
        let linear = AudioFrame::from_samples(&[32124, -32124], TELEPHONY_SAMPLE_RATE);
        let mulaw = linear.to_mulaw();
        assert_eq!(mulaw.encoding(), AudioEncoding::Mulaw);
        assert_eq!(mulaw.data().as_ref(), &[0x80, 0x00]);
        assert_eq!(mulaw.sample_rate(), TELEPHONY_SAMPLE_RATE);
        // The source frame is untouched
        assert_eq!(linear.data().len(), 4);
        assert_eq!(mulaw.to_mulaw(), mulaw);
    }

    #[test]
    fn test_caller_frame_widens_to_backend_rate() {
        let mut resampler = StreamResampler::new(TELEPHONY_SAMPLE_RATE, 16000);
        let caller = AudioFrame::mulaw(vec![0xFFu8; 160], TELEPHONY_SAMPLE_RATE);
        let wide = caller.resampled(&mut resampler);
        assert_eq!(wide.encoding(), AudioEncoding::Linear16);
        assert_eq!(wide.sample_rate(), 16000);
        assert!((318..=322).contains(&wide.sample_count()));
        assert!(wide.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_resampled_frame_takes_output_rate() {
        let mut resampler = StreamResampler::new(24000, TELEPHONY_SAMPLE_RATE);
        let frame = AudioFrame::from_samples(&vec![500i16; 480], 24000);
        let narrow = frame.resampled(&mut resampler);
        assert_eq!(narrow.sample_rate(), TELEPHONY_SAMPLE_RATE);
        assert_eq!(narrow.sample_count(), 160);
    }

    #[test]
    fn test_encoding_display() {
        assert_eq!(AudioEncoding::Mulaw.to_string(), "mulaw");
        assert_eq!(AudioEncoding::Linear16.to_string(), "linear16");
    }
}
