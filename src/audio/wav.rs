use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::segment::{AudioSegment, PlaybackError, SegmentId};
use super::sink::{AudioSink, CompletionSender};
use crate::protocol::pcm::f32_to_pcm16;

/// Output sink that writes every played segment to a mono PCM16 WAV file.
///
/// The file's sample rate is taken from the first segment; segments at a
/// different rate fail to start. With `pace` enabled, completion is reported
/// after the segment's real duration, otherwise immediately.
pub struct WavSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    sample_rate: Option<u32>,
    samples_written: usize,
    completions: CompletionSender,
    pace: bool,
    in_flight: Option<JoinHandle<()>>,
}

impl WavSink {
    pub fn new(path: impl AsRef<Path>, completions: CompletionSender, pace: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            sample_rate: None,
            samples_written: 0,
            completions,
            pace,
            in_flight: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    fn ensure_writer(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        match self.sample_rate {
            Some(rate) if rate != sample_rate => {
                return Err(PlaybackError::Device(format!(
                    "{} is {}Hz, segment is {}Hz",
                    self.path.display(),
                    rate,
                    sample_rate
                )));
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(&self.path, spec)
            .map_err(|e| PlaybackError::Device(format!("{}: {}", self.path.display(), e)))?;

        info!("Writing playback to {} ({}Hz)", self.path.display(), sample_rate);
        self.writer = Some(writer);
        self.sample_rate = Some(sample_rate);
        Ok(())
    }

    fn report_finished(&mut self, id: SegmentId, segment: &AudioSegment) {
        let completions = self.completions.clone();

        if self.pace {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let duration = segment.duration();
                self.in_flight = Some(runtime.spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = completions.send(id);
                }));
                return;
            }
            warn!("No runtime for paced playback, completing immediately");
        }

        let _ = completions.send(id);
    }

    /// Flush and close the WAV file
    pub fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .with_context(|| format!("Failed to finalize {}", self.path.display()))?;
            info!(
                "Finalized {} ({} samples)",
                self.path.display(),
                self.samples_written
            );
        }
        Ok(())
    }
}

impl AudioSink for WavSink {
    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn start(&mut self, id: SegmentId, segment: AudioSegment) -> Result<(), PlaybackError> {
        self.ensure_writer(segment.sample_rate)?;

        if let Some(writer) = &mut self.writer {
            for sample in f32_to_pcm16(&segment.samples) {
                writer
                    .write_sample(sample)
                    .map_err(|e| PlaybackError::Device(e.to_string()))?;
            }
            self.samples_written += segment.len();
        }

        self.report_finished(id, &segment);
        Ok(())
    }

    fn halt(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        "wav"
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        self.halt();
        if let Err(e) = self.finalize() {
            warn!("Failed to finalize WAV sink on drop: {}", e);
        }
    }
}
