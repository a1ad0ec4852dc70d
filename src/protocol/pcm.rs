// PCM16 conversion helpers
//
// All PCM in this system is mono, signed 16-bit, little-endian.
// Floats are normalized by dividing by 32768, so decoding lands in [-1.0, 1.0).

use base64::Engine;

const PCM16_SCALE: f32 = 32768.0;

/// Convert float samples in [-1.0, 1.0] to PCM16 (rounded, clamped)
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = (s * PCM16_SCALE).round();
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

/// Convert PCM16 samples to floats by dividing by 32768
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / PCM16_SCALE).collect()
}

pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reinterpret little-endian bytes as PCM16. Returns None on odd length.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Option<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

/// Encode float samples as base64 PCM16, the way the backend ships TTS chunks
pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    let bytes = pcm16_to_bytes(&f32_to_pcm16(samples));
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 PCM16 into raw bytes (no length validation)
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(data)
}
