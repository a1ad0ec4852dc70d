// Gapless playback queue for streamed TTS chunks
//
// At most one segment is in flight on the sink. Completion of the in-flight
// segment starts the next one; when nothing is left the queue reports a
// drain exactly once. The buffer of not-yet-started segments is bounded:
// on overflow the oldest buffered segments are evicted.

use std::collections::VecDeque;
use tracing::{debug, info, warn};

use super::segment::{AudioSegment, PlaybackError, SegmentId};
use super::sink::AudioSink;

/// Default bound on buffered (not yet started) segments
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// What the queue did in response to an enqueue or a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackProgress {
    /// A segment is in flight
    Playing,
    /// Nothing in flight and nothing buffered; fires once per drain
    Drained,
    /// Completion for a segment that is no longer current (discarded or halted)
    Stale,
}

pub struct PlaybackQueue {
    sink: Box<dyn AudioSink>,
    pending: VecDeque<(SegmentId, AudioSegment)>,
    current: Option<SegmentId>,
    capacity: usize,
    next_id: SegmentId,
    resumed: bool,
    evicted_total: usize,
}

impl PlaybackQueue {
    pub fn new(sink: Box<dyn AudioSink>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!(
            "Playback queue initialized: sink={}, capacity={}",
            sink.name(),
            capacity
        );

        Self {
            sink,
            pending: VecDeque::with_capacity(capacity),
            current: None,
            capacity,
            next_id: 1,
            resumed: false,
            evicted_total: 0,
        }
    }

    /// Decode a base64 PCM16 chunk and queue it. Starts playback if idle.
    ///
    /// A decode error affects only this chunk.
    pub fn enqueue(
        &mut self,
        base64_audio: &str,
        sample_rate: u32,
    ) -> Result<PlaybackProgress, PlaybackError> {
        let segment = AudioSegment::from_base64_pcm16(base64_audio, sample_rate)?;
        Ok(self.enqueue_segment(segment))
    }

    /// Queue an already decoded segment
    pub fn enqueue_segment(&mut self, segment: AudioSegment) -> PlaybackProgress {
        let mut evicted = 0;
        while self.pending.len() >= self.capacity {
            self.pending.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            self.evicted_total += evicted;
            warn!(
                "Playback queue overflow: evicted {} segment(s) to stay within capacity {}",
                evicted, self.capacity
            );
        }

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Queued segment {} ({} samples @ {}Hz)",
            id,
            segment.len(),
            segment.sample_rate
        );
        self.pending.push_back((id, segment));

        if self.current.is_none() {
            self.play_next()
        } else {
            PlaybackProgress::Playing
        }
    }

    /// Report natural completion of a segment started on the sink
    pub fn segment_finished(&mut self, id: SegmentId) -> PlaybackProgress {
        if self.current != Some(id) {
            debug!("Ignoring completion of stale segment {}", id);
            return PlaybackProgress::Stale;
        }

        self.current = None;
        self.play_next()
    }

    fn play_next(&mut self) -> PlaybackProgress {
        while let Some((id, segment)) = self.pending.pop_front() {
            match self.sink.start(id, segment) {
                Ok(()) => {
                    self.current = Some(id);
                    return PlaybackProgress::Playing;
                }
                Err(e) => {
                    warn!("Segment {} failed to start, skipping: {}", id, e);
                }
            }
        }

        self.current = None;
        debug!("Playback queue drained");
        PlaybackProgress::Drained
    }

    /// Halt the in-flight segment and discard everything buffered. Idempotent.
    pub fn stop(&mut self) {
        let discarded = self.pending.len();
        self.pending.clear();

        if let Some(id) = self.current.take() {
            self.sink.halt();
            info!(
                "Playback stopped: halted segment {}, discarded {} buffered",
                id, discarded
            );
        }
    }

    /// Activate the output device once; later calls are no-ops
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.resumed {
            return Ok(());
        }
        self.sink.resume()?;
        self.resumed = true;
        Ok(())
    }

    /// Stop and forget device activation, as if newly constructed
    pub fn reset(&mut self) {
        self.stop();
        self.resumed = false;
    }

    /// Something is in flight
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Number of buffered (not yet started) segments
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn current(&self) -> Option<SegmentId> {
        self.current
    }

    /// Ids of buffered segments in playback order
    pub fn pending_ids(&self) -> Vec<SegmentId> {
        self.pending.iter().map(|(id, _)| *id).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted_total(&self) -> usize {
        self.evicted_total
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }
}
