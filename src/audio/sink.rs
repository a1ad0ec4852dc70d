use tokio::sync::mpsc;
use tracing::debug;

use super::segment::{AudioSegment, PlaybackError, SegmentId};

/// Channel on which sinks report natural completion of a segment
pub type CompletionSender = mpsc::UnboundedSender<SegmentId>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<SegmentId>;

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Audio output device
///
/// Implementations:
/// - `NullSink`: discards audio, completes immediately
/// - `WavSink`: writes played audio to a WAV file
/// - `SpeakerSink` (feature `speaker`): default output device via rodio
///
/// `start` must not report completion synchronously; completion is sent on
/// the sink's `CompletionSender` and fed back to the queue by the event loop.
pub trait AudioSink {
    /// Activate the output device (may start suspended)
    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Begin playing one segment
    fn start(&mut self, id: SegmentId, segment: AudioSegment) -> Result<(), PlaybackError>;

    /// Halt the in-flight segment, if any. Halted segments never report completion.
    fn halt(&mut self);

    /// Name for logging
    fn name(&self) -> &str;
}

/// Discards audio and reports each segment finished right away
pub struct NullSink {
    completions: CompletionSender,
}

impl NullSink {
    pub fn new(completions: CompletionSender) -> Self {
        Self { completions }
    }
}

impl AudioSink for NullSink {
    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn start(&mut self, id: SegmentId, segment: AudioSegment) -> Result<(), PlaybackError> {
        debug!("Null sink dropping segment {} ({} samples)", id, segment.len());
        self.completions
            .send(id)
            .map_err(|_| PlaybackError::Device("completion channel closed".to_string()))
    }

    fn halt(&mut self) {}

    fn name(&self) -> &str {
        "null"
    }
}
