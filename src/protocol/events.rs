use serde::{Deserialize, Serialize};

/// Sample rate of captured speech sent to the backend
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Event sent from the client to the voice backend
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Speech detected (epoch milliseconds)
    VadStart { timestamp: i64 },
    /// Captured speech as mono PCM16 samples
    VadAudio { audio: Vec<i16>, sample_rate: u32 },
    /// Speech ended (epoch milliseconds)
    VadEnd { timestamp: i64 },
    /// Cancel ongoing processing
    Cancel,
}

impl ClientEvent {
    pub fn vad_start_now() -> Self {
        ClientEvent::VadStart {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn vad_end_now() -> Self {
        ClientEvent::VadEnd {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::VadStart { .. } => "vad.start",
            ClientEvent::VadAudio { .. } => "vad.audio",
            ClientEvent::VadEnd { .. } => "vad.end",
            ClientEvent::Cancel => "cancel",
        }
    }
}

/// JSON header carried inside the binary vad.audio frame.
///
/// Field order matters for byte-identical output:
/// `{"type":"vad.audio","sampleRate":16000}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFrameHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
}

/// Audio encoding of a TTS chunk. Only PCM16 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
}

/// Event received from the voice backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Interim recognition text (replaces the previous partial)
    #[serde(rename = "stt.partial")]
    SttPartial { text: String },

    /// Final recognition result for the utterance
    #[serde(rename = "stt.final")]
    SttFinal { text: String, latency_ms: f64 },

    #[serde(rename = "llm.start")]
    LlmStart {},

    /// One streamed response token
    #[serde(rename = "llm.delta")]
    LlmDelta { text: String },

    #[serde(rename = "llm.end")]
    LlmEnd { latency_ms: f64, ttft_ms: f64 },

    /// Base64-encoded PCM16 speech
    #[serde(rename = "tts.chunk")]
    TtsChunk {
        audio: String,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
        format: AudioFormat,
    },

    #[serde(rename = "tts.end")]
    TtsEnd { latency_ms: f64 },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::SttPartial { .. } => "stt.partial",
            ServerEvent::SttFinal { .. } => "stt.final",
            ServerEvent::LlmStart {} => "llm.start",
            ServerEvent::LlmDelta { .. } => "llm.delta",
            ServerEvent::LlmEnd { .. } => "llm.end",
            ServerEvent::TtsChunk { .. } => "tts.chunk",
            ServerEvent::TtsEnd { .. } => "tts.end",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Checks value constraints serde cannot express: latencies must be
    /// finite and non-negative, sample rates positive.
    pub(crate) fn is_well_formed(&self) -> bool {
        fn latency_ok(ms: f64) -> bool {
            ms.is_finite() && ms >= 0.0
        }

        match self {
            ServerEvent::SttFinal { latency_ms, .. } | ServerEvent::TtsEnd { latency_ms } => {
                latency_ok(*latency_ms)
            }
            ServerEvent::LlmEnd { latency_ms, ttft_ms } => {
                latency_ok(*latency_ms) && latency_ok(*ttft_ms)
            }
            ServerEvent::TtsChunk { sample_rate, .. } => *sample_rate > 0,
            ServerEvent::SttPartial { .. }
            | ServerEvent::LlmStart {}
            | ServerEvent::LlmDelta { .. }
            | ServerEvent::Error { .. } => true,
        }
    }
}

/// Result of parsing one inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    Event(ServerEvent),
    /// Unknown tag or wrong shape; callers drop it silently
    Unrecognized,
}

impl ParsedEvent {
    pub fn into_event(self) -> Option<ServerEvent> {
        match self {
            ParsedEvent::Event(event) => Some(event),
            ParsedEvent::Unrecognized => None,
        }
    }
}
