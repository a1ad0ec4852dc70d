use std::time::Duration;
use thiserror::Error;

use crate::protocol::pcm::{bytes_to_pcm16, decode_base64, pcm16_to_f32};

/// Identifies one enqueued segment for completion reporting
pub type SegmentId = u64;

/// Errors isolated to a single TTS chunk or device call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("invalid base64 audio data: {0}")]
    InvalidBase64(String),

    #[error("empty audio payload")]
    EmptyPayload,

    #[error("PCM16 payload has odd byte length {0}")]
    OddLength(usize),

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("audio device error: {0}")]
    Device(String),
}

/// Decoded mono audio ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// base64 → bytes → PCM16 LE → floats (÷32768)
    pub fn from_base64_pcm16(data: &str, sample_rate: u32) -> Result<Self, PlaybackError> {
        if sample_rate == 0 {
            return Err(PlaybackError::InvalidSampleRate(sample_rate));
        }

        let bytes = decode_base64(data).map_err(|e| PlaybackError::InvalidBase64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(PlaybackError::EmptyPayload);
        }

        let pcm = bytes_to_pcm16(&bytes).ok_or(PlaybackError::OddLength(bytes.len()))?;

        Ok(Self {
            samples: pcm16_to_f32(&pcm),
            sample_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration at the segment's sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::pcm::encode_pcm16_base64;

    #[test]
    fn test_decode_known_samples() {
        // 0, 16384, -32768 as LE bytes
        let encoded = "AAAAQACA";
        let segment = AudioSegment::from_base64_pcm16(encoded, 24000).unwrap();

        assert_eq!(segment.samples, vec![0.0, 0.5, -1.0]);
        assert_eq!(segment.sample_rate, 24000);
    }

    #[test]
    fn test_invalid_base64() {
        let result = AudioSegment::from_base64_pcm16("not base64!!", 24000);
        assert!(matches!(result, Err(PlaybackError::InvalidBase64(_))));
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(
            AudioSegment::from_base64_pcm16("", 24000),
            Err(PlaybackError::EmptyPayload)
        );
    }

    #[test]
    fn test_odd_length() {
        // three bytes
        assert_eq!(
            AudioSegment::from_base64_pcm16("AAAA", 24000),
            Err(PlaybackError::OddLength(3))
        );
    }

    #[test]
    fn test_zero_sample_rate() {
        let encoded = encode_pcm16_base64(&[0.1, 0.2]);
        assert_eq!(
            AudioSegment::from_base64_pcm16(&encoded, 0),
            Err(PlaybackError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn test_duration() {
        let segment = AudioSegment::new(vec![0.0; 8000], 16000);
        assert_eq!(segment.duration(), Duration::from_millis(500));
    }
}
