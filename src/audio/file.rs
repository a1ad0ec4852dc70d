use anyhow::{anyhow, bail, Context, Result};
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use tracing::{debug, info};

const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// A WAV utterance loaded for sending as captured speech
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(|s| s as f32 / 32768.0))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (format, bits) => bail!("Unsupported WAV format: {:?} {}-bit", format, bits),
        };

        if spec.channels == 0 {
            bail!("WAV file declares zero channels");
        }

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at `target_rate`, ready for vad.audio
    pub fn to_mono(&self, target_rate: u32) -> Result<Vec<f32>> {
        let mono = downmix(&self.samples, self.channels);
        resample(&mono, self.sample_rate, target_rate)
    }
}

/// Average interleaved channels into one
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling of mono samples
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        bail!("Sample rates must be greater than 0 ({} -> {})", from_rate, to_rate);
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK_FRAMES, 1)
        .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK_FRAMES);

    for chunk in samples.chunks(RESAMPLE_CHUNK_FRAMES) {
        // SincFixedIn takes exactly one chunk per call; the tail is zero-padded
        let mut input = vec![0.0f32; RESAMPLE_CHUNK_FRAMES];
        input[..chunk.len()].copy_from_slice(chunk);

        let processed = resampler
            .process(&[input], None)
            .map_err(|e| anyhow!("Resampling failed: {}", e))?;

        let frames = if chunk.len() < RESAMPLE_CHUNK_FRAMES {
            (chunk.len() as f64 * ratio).ceil() as usize
        } else {
            processed[0].len()
        };
        output.extend(processed[0].iter().take(frames));
    }

    output.truncate(expected);
    debug!(
        "Resampled {} samples ({}Hz) -> {} samples ({}Hz)",
        samples.len(),
        from_rate,
        output.len(),
        to_rate
    );

    Ok(output)
}
