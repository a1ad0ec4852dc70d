//! Voice session management
//!
//! This module provides the `Session` state machine that manages:
//! - The socket connection lifecycle
//! - Capture callbacks (speech start / end / misfire) and outgoing frames
//! - Server events for recognition, generation and speech
//! - Gapless playback of streamed speech
//! - Switching between the live view and a past conversation

mod config;
mod runner;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use runner::{CaptureEvent, SessionRunner};
pub use session::Session;
pub use state::{GenerationState, PlaybackState, RecordingState};
pub use stats::{GenerationResult, RecognitionResult, ServerError, SessionStatus, TimelineEntry};
