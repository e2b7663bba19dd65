//! G.711 μ-law companding and PCM16 byte helpers.
//!
//! Telephony media streams carry 8-bit μ-law samples at 8kHz. The realtime
//! backends expect 16-bit signed little-endian PCM. The conversions here are
//! stateless and never fail: every one of the 256 μ-law codes is valid.
//!
//! ## Algorithm
//!
//! - Magnitudes are biased by 0x84 (132) before segment lookup
//! - Input is clipped to ±32635 so the biased value fits in 15 bits
//! - The encoded byte is the one's complement of `sign | segment << 4 | mantissa`

/// Bias added to the magnitude before segment lookup.
const MULAW_BIAS: i32 = 0x84;

/// Largest magnitude that survives biasing without overflowing the top segment.
const MULAW_CLIP: i32 = 32635;

/// Expand a single μ-law code to a 16-bit linear sample.
#[inline]
pub fn mulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let exponent = (code >> 4) & 0x07;
    let mantissa = (code & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;

    if code & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Compress a single 16-bit linear sample to μ-law.
#[inline]
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let value = sample as i32;
    let sign: u8 = if value < 0 { 0x80 } else { 0x00 };
    let magnitude = value.abs().min(MULAW_CLIP) + MULAW_BIAS;

    // Biased magnitude lies in 132..=32767, so its top bit sits between bit 7 and bit 14.
    let exponent = (8 - (magnitude as u16).leading_zeros()) as u8;
    let mantissa = ((magnitude >> (exponent + 3)) & 0x0F) as u8;

    !(sign | (exponent << 4) | mantissa)
}

/// Decode a buffer of μ-law bytes into linear PCM samples (one sample per byte).
pub fn decode_mulaw(encoded: &[u8]) -> Vec<i16> {
    encoded.iter().map(|&code| mulaw_to_linear(code)).collect()
}

/// Encode linear PCM samples into μ-law bytes. Lossy.
pub fn encode_mulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_mulaw(s)).collect()
}

/// Interpret little-endian bytes as PCM16 samples. A trailing odd byte is ignored.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serialize PCM16 samples as little-endian bytes.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Root-mean-square energy of a block of samples.
pub fn rms(samples: &[i16]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_codes() {
        assert_eq!(mulaw_to_linear(0xFF), 0);
        assert_eq!(mulaw_to_linear(0x7F), 0);
        assert_eq!(linear_to_mulaw(0), 0xFF);
    }

    #[test]
    fn test_extreme_codes() {
        assert_eq!(mulaw_to_linear(0x80), 32124);
        assert_eq!(mulaw_to_linear(0x00), -32124);
        assert_eq!(linear_to_mulaw(i16::MAX), 0x80);
        assert_eq!(linear_to_mulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_decode_length_matches_input() {
        let input: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_mulaw(&input).len(), input.len());
        assert!(decode_mulaw(&[]).is_empty());
    }

    #[test]
    fn test_every_code_survives_reencoding() {
        for code in 0..=255u8 {
            let reencoded = linear_to_mulaw(mulaw_to_linear(code));
            if code == 0x7F {
                // Negative zero collapses onto positive zero.
                assert_eq!(reencoded, 0xFF);
            } else {
                assert_eq!(reencoded, code, "code {code:#04x} did not round-trip");
            }
        }
    }

    #[test]
    fn test_encode_is_monotonic_in_magnitude() {
        let mut last = mulaw_to_linear(linear_to_mulaw(0));
        for sample in (0..=32000i16).step_by(97) {
            let decoded = mulaw_to_linear(linear_to_mulaw(sample));
            assert!(decoded >= last, "{sample} decoded to {decoded} below {last}");
            last = decoded;
        }
    }

    #[test]
    fn test_lossy_roundtrip_stays_close() {
        for sample in [-20000i16, -1000, -100, 0, 50, 999, 12345, 30000] {
            let restored = mulaw_to_linear(linear_to_mulaw(sample)) as i32;
            let error = (restored - sample as i32).abs();
            // Quantisation step in the top segment is 1024.
            assert!(error <= 1024, "sample {sample} restored as {restored}");
        }
    }

    #[test]
    fn test_pcm16_byte_conversion() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = pcm16_to_le_bytes(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[2..4], &[0x01, 0x00]);
        assert_eq!(pcm16_from_le_bytes(&bytes), samples);

        // Odd trailing byte is dropped
        assert_eq!(pcm16_from_le_bytes(&[0x01, 0x00, 0x7F]), vec![1]);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0);
        assert_eq!(rms(&[1000, -1000, 1000, -1000]), 1000);
    }
}
