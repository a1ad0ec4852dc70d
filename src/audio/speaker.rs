// Default output device via rodio (feature `speaker`)

use anyhow::{Context, Result};
use rodio::buffer::SamplesBuffer;
use rodio::source::EmptyCallback;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::info;

use super::segment::{AudioSegment, PlaybackError, SegmentId};
use super::sink::{AudioSink, CompletionSender};

/// Plays segments on the default output device.
///
/// The rodio stream is not `Send`, so this sink must live on the thread that
/// runs the session loop.
pub struct SpeakerSink {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    completions: CompletionSender,
}

impl SpeakerSink {
    pub fn new(completions: CompletionSender) -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("Failed to open default output device")?;

        info!("Speaker sink opened on default output device");

        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            completions,
        })
    }

    fn sink(&mut self) -> Result<&Sink, PlaybackError> {
        if self.sink.is_none() {
            let sink =
                Sink::try_new(&self.handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
            self.sink = Some(sink);
        }

        self.sink
            .as_ref()
            .ok_or_else(|| PlaybackError::Device("output sink unavailable".to_string()))
    }
}

impl AudioSink for SpeakerSink {
    fn resume(&mut self) -> Result<(), PlaybackError> {
        let sink = self.sink()?;
        if sink.is_paused() {
            sink.play();
        }
        Ok(())
    }

    fn start(&mut self, id: SegmentId, segment: AudioSegment) -> Result<(), PlaybackError> {
        let completions = self.completions.clone();
        let sink = self.sink()?;

        sink.append(SamplesBuffer::new(1, segment.sample_rate, segment.samples));
        sink.append(EmptyCallback::<f32>::new(Box::new(move || {
            let _ = completions.send(id);
        })));
        Ok(())
    }

    fn halt(&mut self) {
        // A stopped rodio sink is dropped; the next segment gets a fresh one
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn name(&self) -> &str {
        "speaker"
    }
}
