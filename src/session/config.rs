use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_QUEUE_CAPACITY;
use crate::config::Config;
use crate::protocol::CAPTURE_SAMPLE_RATE;

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of buffered TTS chunks before the oldest are evicted
    pub queue_capacity: usize,

    /// Sample rate declared in vad.audio frames (backend expects 16kHz)
    pub capture_sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.audio.queue_capacity,
            capture_sample_rate: config.audio.capture_sample_rate,
        }
    }
}
