// Integration tests for the gapless playback queue
//
// A recording sink stands in for the output device so tests can drive
// segment completion by hand.

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use voicechat::audio::{
    completion_channel, AudioSegment, AudioSink, PlaybackError, PlaybackProgress, PlaybackQueue,
    SegmentId, WavSink,
};
use voicechat::protocol::pcm::encode_pcm16_base64;

#[derive(Debug, Clone, PartialEq)]
enum SinkCall {
    Resume,
    Start(SegmentId, usize),
    Halt,
}

/// Records calls; segments whose first sample is exactly 1.0 fail to start
#[derive(Clone, Default)]
struct RecordingSink {
    calls: Rc<RefCell<Vec<SinkCall>>>,
}

impl RecordingSink {
    fn started(&self) -> Vec<SegmentId> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Start(id, _) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, call: &SinkCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }
}

impl AudioSink for RecordingSink {
    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.calls.borrow_mut().push(SinkCall::Resume);
        Ok(())
    }

    fn start(&mut self, id: SegmentId, segment: AudioSegment) -> Result<(), PlaybackError> {
        if segment.samples.first() == Some(&1.0) {
            return Err(PlaybackError::Device("refused".to_string()));
        }
        self.calls
            .borrow_mut()
            .push(SinkCall::Start(id, segment.len()));
        Ok(())
    }

    fn halt(&mut self) {
        self.calls.borrow_mut().push(SinkCall::Halt);
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn chunk(samples: usize) -> String {
    encode_pcm16_base64(&vec![0.1f32; samples])
}

fn queue(capacity: usize) -> (PlaybackQueue, RecordingSink) {
    let sink = RecordingSink::default();
    (PlaybackQueue::new(Box::new(sink.clone()), capacity), sink)
}

#[test]
fn test_first_chunk_starts_immediately() -> Result<()> {
    let (mut queue, sink) = queue(4);

    let progress = queue.enqueue(&chunk(10), 24000)?;

    assert_eq!(progress, PlaybackProgress::Playing);
    assert_eq!(sink.started(), vec![1]);
    assert!(queue.is_active());
    assert_eq!(queue.len(), 0);

    Ok(())
}

#[test]
fn test_gapless_fifo_playback() -> Result<()> {
    let (mut queue, sink) = queue(8);

    for n in 1..=3 {
        queue.enqueue(&chunk(n), 24000)?;
    }
    assert_eq!(sink.started(), vec![1]);
    assert_eq!(queue.pending_ids(), vec![2, 3]);

    assert_eq!(queue.segment_finished(1), PlaybackProgress::Playing);
    assert_eq!(queue.segment_finished(2), PlaybackProgress::Playing);
    assert_eq!(queue.segment_finished(3), PlaybackProgress::Drained);

    assert_eq!(sink.started(), vec![1, 2, 3]);
    assert!(!queue.is_active());

    Ok(())
}

#[test]
fn test_drain_fires_once() -> Result<()> {
    let (mut queue, _sink) = queue(4);

    queue.enqueue(&chunk(4), 24000)?;
    assert_eq!(queue.segment_finished(1), PlaybackProgress::Drained);

    // A repeated completion is stale, not a second drain
    assert_eq!(queue.segment_finished(1), PlaybackProgress::Stale);

    Ok(())
}

#[test]
fn test_overflow_keeps_most_recent_chunks() -> Result<()> {
    let capacity = 5;
    let (mut queue, sink) = queue(capacity);

    // Segment 1 starts right away; 2..=12 compete for 5 buffered slots
    for _ in 0..12 {
        queue.enqueue(&chunk(8), 16000)?;
    }

    assert_eq!(queue.len(), capacity);
    assert_eq!(queue.pending_ids(), vec![8, 9, 10, 11, 12]);
    assert_eq!(queue.evicted_total(), 6);

    let mut id = 1;
    loop {
        match queue.segment_finished(id) {
            PlaybackProgress::Playing => id = queue.current().expect("segment in flight"),
            PlaybackProgress::Drained => break,
            PlaybackProgress::Stale => panic!("unexpected stale completion"),
        }
    }

    assert_eq!(sink.started(), vec![1, 8, 9, 10, 11, 12]);

    Ok(())
}

#[test]
fn test_decode_failure_isolated_to_chunk() -> Result<()> {
    let (mut queue, sink) = queue(4);

    queue.enqueue(&chunk(2), 24000)?;
    assert!(matches!(
        queue.enqueue("%%%not base64%%%", 24000),
        Err(PlaybackError::InvalidBase64(_))
    ));
    assert!(matches!(queue.enqueue("", 24000), Err(PlaybackError::EmptyPayload)));
    queue.enqueue(&chunk(3), 24000)?;

    assert_eq!(queue.pending_ids(), vec![2]);
    queue.segment_finished(1);
    assert_eq!(sink.started(), vec![1, 2]);

    Ok(())
}

#[test]
fn test_failed_start_advances_to_next() -> Result<()> {
    let (mut queue, sink) = queue(4);

    queue.enqueue(&chunk(2), 24000)?;
    queue.enqueue_segment(AudioSegment::new(vec![1.0, 0.0], 24000));
    queue.enqueue(&chunk(5), 24000)?;

    // Segment 2 is refused by the sink and skipped
    assert_eq!(queue.segment_finished(1), PlaybackProgress::Playing);
    assert_eq!(queue.current(), Some(3));
    assert_eq!(sink.started(), vec![1, 3]);

    Ok(())
}

#[test]
fn test_only_failing_segments_drain() {
    let (mut queue, sink) = queue(4);

    let progress = queue.enqueue_segment(AudioSegment::new(vec![1.0], 24000));

    assert_eq!(progress, PlaybackProgress::Drained);
    assert!(sink.started().is_empty());
    assert!(!queue.is_active());
}

#[test]
fn test_stop_discards_and_silences_completions() -> Result<()> {
    let (mut queue, sink) = queue(4);

    for _ in 0..3 {
        queue.enqueue(&chunk(4), 24000)?;
    }
    queue.stop();

    assert_eq!(queue.len(), 0);
    assert!(!queue.is_active());
    assert_eq!(sink.count(&SinkCall::Halt), 1);

    // Completions from the halted or discarded segments are ignored
    for id in 1..=3 {
        assert_eq!(queue.segment_finished(id), PlaybackProgress::Stale);
    }
    assert_eq!(sink.started(), vec![1]);

    // Idempotent
    queue.stop();
    assert_eq!(sink.count(&SinkCall::Halt), 1);

    Ok(())
}

#[test]
fn test_resume_once() -> Result<()> {
    let (mut queue, sink) = queue(4);

    queue.resume()?;
    queue.resume()?;
    assert_eq!(sink.count(&SinkCall::Resume), 1);
    assert!(queue.is_resumed());

    queue.reset();
    assert!(!queue.is_resumed());
    queue.resume()?;
    assert_eq!(sink.count(&SinkCall::Resume), 2);

    Ok(())
}

#[tokio::test]
async fn test_wav_sink_writes_segments() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("speech.wav");
    let (tx, mut rx) = completion_channel();

    {
        let mut queue = PlaybackQueue::new(Box::new(WavSink::new(&path, tx, false)), 4);
        queue.enqueue(&chunk(100), 24000)?;
        queue.enqueue(&chunk(50), 24000)?;

        let first = rx.recv().await.expect("completion");
        assert_eq!(first, 1);
        assert_eq!(queue.segment_finished(first), PlaybackProgress::Playing);

        let second = rx.recv().await.expect("completion");
        assert_eq!(queue.segment_finished(second), PlaybackProgress::Drained);
    }

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.spec().sample_rate, 24000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 150);

    Ok(())
}

#[tokio::test]
async fn test_wav_sink_rejects_rate_change() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("speech.wav");
    let (tx, mut rx) = completion_channel();

    let mut queue = PlaybackQueue::new(Box::new(WavSink::new(&path, tx, false)), 4);
    queue.enqueue(&chunk(10), 24000)?;
    queue.enqueue(&chunk(10), 16000)?;

    let first = rx.recv().await.expect("completion");
    // The 16kHz segment cannot start on a 24kHz file and is skipped
    assert_eq!(queue.segment_finished(first), PlaybackProgress::Drained);

    Ok(())
}
