use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{GenerationState, PlaybackState, RecordingState};
use crate::history::{ConversationId, Role};
use crate::transport::ConnectionState;

/// A final recognition result from the STT service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Recognized text
    pub text: String,

    /// Recognition latency reported by the backend
    pub latency_ms: f64,

    /// When this result was received
    pub timestamp: DateTime<Utc>,
}

/// A completed generated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Concatenation of all streamed tokens
    pub text: String,

    /// Total generation latency
    pub latency_ms: f64,

    /// Time to first token
    pub ttft_ms: f64,

    /// When generation finished
    pub timestamp: DateTime<Utc>,
}

/// Application-level error reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// One chat bubble, live or historical
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub role: Role,
    pub text: String,
    pub latency_ms: f64,
    pub ttft_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of everything the UI renders from the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub recording: RecordingState,
    pub generation: GenerationState,
    pub playback: PlaybackState,

    /// Whether speech detection is armed
    pub listening: bool,

    /// Speech detector model still loading
    pub detector_loading: bool,

    /// Speech detector failed to load or run
    pub detector_error: bool,

    /// Live partial recognition text
    pub partial_text: String,

    /// Tokens streamed so far for the response in progress
    pub streaming_text: String,

    pub recognition_count: usize,
    pub generation_count: usize,
    pub last_error: Option<ServerError>,

    /// Final TTS latency of the last spoken response
    pub tts_latency_ms: Option<f64>,

    /// Buffered (not yet started) speech segments
    pub queued_segments: usize,

    /// Responses fully spoken (or ended without audio)
    pub turns_completed: usize,

    pub selected_conversation: Option<ConversationId>,
    pub loading_conversation: bool,
    pub conversation_error: Option<String>,
}
