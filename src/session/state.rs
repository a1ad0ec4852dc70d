use serde::Serialize;

/// Capture pipeline state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No utterance in progress
    #[default]
    Idle,
    /// Speech detected, capturing
    Recording,
    /// Utterance sent, waiting for the final recognition result
    Processing,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "idle"),
            RecordingState::Recording => write!(f, "recording"),
            RecordingState::Processing => write!(f, "processing"),
        }
    }
}

/// Response generation state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    #[default]
    Idle,
    /// Generation started, no tokens yet
    Processing,
    /// At least one token received since the last start
    Streaming,
}

impl GenerationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GenerationState::Idle)
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationState::Idle => write!(f, "idle"),
            GenerationState::Processing => write!(f, "processing"),
            GenerationState::Streaming => write!(f, "streaming"),
        }
    }
}

/// Speech playback state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    /// Audio buffered or in flight, or more chunks expected
    Playing,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}
