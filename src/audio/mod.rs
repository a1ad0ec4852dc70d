pub mod file;
pub mod queue;
pub mod segment;
pub mod sink;
pub mod wav;

#[cfg(feature = "speaker")]
pub mod speaker;

pub use file::AudioFile;
pub use queue::{PlaybackProgress, PlaybackQueue, DEFAULT_QUEUE_CAPACITY};
pub use segment::{AudioSegment, PlaybackError, SegmentId};
pub use sink::{completion_channel, AudioSink, CompletionReceiver, CompletionSender, NullSink};
pub use wav::WavSink;

#[cfg(feature = "speaker")]
pub use speaker::SpeakerSink;
