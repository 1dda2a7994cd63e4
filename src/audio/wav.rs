//! WAV decoding and encoding for pipeline waveforms.
//!
//! All stages exchange audio as mono `f32` samples in [-1.0, 1.0]. Files on
//! disk are written as 16-bit PCM, which ffmpeg, demucs and whisper.cpp all
//! read.

use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

/// Incremental mono 16-bit PCM writer for output produced block by block.
pub struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl WavSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(write_error)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            self.writer.write_sample(value).map_err(write_error)?;
        }
        Ok(())
    }

    /// Patch the header with the final length and flush.
    pub fn finish(self) -> Result<()> {
        self.writer.finalize().map_err(write_error)
    }
}

fn write_error(e: hound::Error) -> PipelineError {
    match e {
        hound::Error::IoError(io) => PipelineError::Io(io),
        other => PipelineError::Other(format!("Failed to write WAV: {}", other)),
    }
}

/// Sample rate and duration measured from decoded samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// A mono waveform held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file, averaging all channels to mono.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::Conversion {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Decode WAV data from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| PipelineError::Conversion {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(PipelineError::Conversion {
                message: format!(
                    "Invalid WAV header: {} Hz, {} channels",
                    spec.sample_rate, spec.channels
                ),
            });
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| PipelineError::Conversion {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let samples = downmix(&interleaved, spec.channels as usize);

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Encode as mono 16-bit PCM.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut sink = WavSink::create(path, self.sample_rate)?;
        sink.write(&self.samples)?;
        sink.finish()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn info(&self) -> AudioInfo {
        AudioInfo {
            sample_rate: self.sample_rate,
            duration_secs: self.duration_secs(),
        }
    }

    /// Copy the samples between `start_secs` and `end_secs`.
    ///
    /// Sample indices are truncated toward zero and clamped to the waveform.
    pub fn slice_secs(&self, start_secs: f64, end_secs: f64) -> Waveform {
        let rate = self.sample_rate as f64;
        let len = self.samples.len();
        let start = ((start_secs.max(0.0) * rate) as usize).min(len);
        let end = ((end_secs.max(0.0) * rate) as usize).clamp(start, len);
        Waveform::new(self.samples[start..end].to_vec(), self.sample_rate)
    }

    /// Linear-interpolation resampling.
    pub fn resampled(&self, to_rate: u32) -> Waveform {
        Waveform::new(resample(&self.samples, self.sample_rate, to_rate), to_rate)
    }
}

/// Decode a file and report its measured sample rate and duration.
pub fn probe(path: &Path) -> Result<AudioInfo> {
    Waveform::read(path).map(|w| w.info())
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
