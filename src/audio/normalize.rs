//! Format normalization: any input container to mono PCM WAV at a target rate.

use crate::audio::wav::{self, AudioInfo};
use crate::error::{PipelineError, Result};
use crate::process::CommandExecutor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// A normalized waveform on disk plus metadata measured from its samples.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    pub path: PathBuf,
    pub info: AudioInfo,
}

/// Converts uploaded audio with ffmpeg and measures the result.
pub struct Normalizer {
    executor: Arc<dyn CommandExecutor>,
    ffmpeg: String,
}

impl Normalizer {
    pub fn new(executor: Arc<dyn CommandExecutor>, ffmpeg: impl Into<String>) -> Self {
        Self {
            executor,
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Transcode `input` into `output_dir` as mono WAV at `target_sample_rate`.
    ///
    /// The input file is only read. Duration and sample rate come from
    /// decoding the written file, not from the input's headers.
    ///
    /// # Errors
    /// Returns `PipelineError::Conversion` if the input is unreadable, the
    /// transcoder is missing or fails, or its output cannot be decoded.
    pub fn normalize(
        &self,
        input: &Path,
        output_dir: &Path,
        target_sample_rate: u32,
    ) -> Result<NormalizedAudio> {
        std::fs::File::open(input).map_err(|e| PipelineError::Conversion {
            message: format!("Cannot read input {}: {}", input.display(), e),
        })?;

        let output = output_dir.join(format!("{}_normalized.wav", Uuid::new_v4().simple()));
        let input_arg = path_arg(input)?;
        let output_arg = path_arg(&output)?;
        let rate = target_sample_rate.to_string();

        let args = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            input_arg,
            "-ac",
            "1",
            "-ar",
            rate.as_str(),
            output_arg,
        ];
        self.executor
            .execute(&self.ffmpeg, &args)
            .map_err(|e| PipelineError::Conversion {
                message: e.to_string(),
            })?;

        let info = wav::probe(&output).map_err(|e| PipelineError::Conversion {
            message: format!("Transcoder output is not decodable: {}", e),
        })?;

        tracing::debug!(
            path = %output.display(),
            sample_rate = info.sample_rate,
            duration_secs = info.duration_secs,
            "Audio normalized"
        );

        Ok(NormalizedAudio { path: output, info })
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| PipelineError::Conversion {
        message: format!("Path is not valid UTF-8: {}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::Waveform;
    use crate::process::MockCommandExecutor;
    use tempfile::TempDir;

    /// Stands in for ffmpeg: decodes the `-i` WAV and rewrites it at the
    /// `-ar` rate (without real resampling, so duration scales accordingly).
    fn fake_ffmpeg() -> MockCommandExecutor {
        MockCommandExecutor::with_handler(|_, args| {
            let input = args[args.iter().position(|a| *a == "-i").unwrap() + 1];
            let rate: u32 = args[args.iter().position(|a| *a == "-ar").unwrap() + 1]
                .parse()
                .unwrap();
            let output = args[args.len() - 1];
            let waveform = Waveform::read(Path::new(input))?;
            Waveform::new(waveform.into_samples(), rate).write(Path::new(output))?;
            Ok(String::new())
        })
    }

    fn write_input(dir: &Path, seconds: f64, rate: u32) -> PathBuf {
        let path = dir.join("input.wav");
        let samples = vec![0.1f32; (seconds * rate as f64) as usize];
        Waveform::new(samples, rate).write(&path).unwrap();
        path
    }

    #[test]
    fn normalize_passes_mono_and_rate_to_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), 1.0, 16000);
        let executor = Arc::new(fake_ffmpeg());
        let normalizer = Normalizer::new(executor.clone(), "ffmpeg");

        let normalized = normalizer.normalize(&input, dir.path(), 16000).unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ffmpeg");
        let args = &calls[0].1;
        assert!(args.windows(2).any(|w| w[0] == "-ac" && w[1] == "1"));
        assert!(args.windows(2).any(|w| w[0] == "-ar" && w[1] == "16000"));
        assert!(normalized.path.starts_with(dir.path()));
        assert!(
            normalized
                .path
                .to_string_lossy()
                .ends_with("_normalized.wav")
        );
        assert_eq!(normalized.info.sample_rate, 16000);
        assert!((normalized.info.duration_secs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_does_not_touch_input() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), 0.5, 16000);
        let before = std::fs::read(&input).unwrap();

        let normalizer = Normalizer::new(Arc::new(fake_ffmpeg()), "ffmpeg");
        normalizer.normalize(&input, dir.path(), 16000).unwrap();

        assert_eq!(std::fs::read(&input).unwrap(), before);
    }

    #[test]
    fn normalize_measures_metadata_from_output() {
        let dir = TempDir::new().unwrap();
        // 8000 samples declared at 8kHz, rewritten at 16kHz by the fake transcoder.
        let input = write_input(dir.path(), 1.0, 8000);
        let normalizer = Normalizer::new(Arc::new(fake_ffmpeg()), "ffmpeg");

        let normalized = normalizer.normalize(&input, dir.path(), 16000).unwrap();
        assert_eq!(normalized.info.sample_rate, 16000);
        assert!((normalized.info.duration_secs - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalize_twice_yields_same_metadata() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), 2.0, 16000);
        let normalizer = Normalizer::new(Arc::new(fake_ffmpeg()), "ffmpeg");

        let first = normalizer.normalize(&input, dir.path(), 16000).unwrap();
        let second = normalizer.normalize(&input, dir.path(), 16000).unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(first.info, second.info);
    }

    #[test]
    fn normalize_missing_input_is_conversion_error() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(fake_ffmpeg());
        let normalizer = Normalizer::new(executor.clone(), "ffmpeg");

        let result = normalizer.normalize(&dir.path().join("missing.mp3"), dir.path(), 16000);
        assert!(matches!(result, Err(PipelineError::Conversion { .. })));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn normalize_tool_failure_is_conversion_error() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), 0.5, 16000);
        let normalizer = Normalizer::new(Arc::new(MockCommandExecutor::failing()), "ffmpeg");

        match normalizer.normalize(&input, dir.path(), 16000) {
            Err(PipelineError::Conversion { message }) => assert!(message.contains("ffmpeg")),
            other => panic!("Expected Conversion error, got {:?}", other),
        }
    }

    #[test]
    fn normalize_undecodable_output_is_conversion_error() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), 0.5, 16000);
        // Tool "succeeds" but writes nothing.
        let normalizer = Normalizer::new(Arc::new(MockCommandExecutor::succeeding()), "ffmpeg");

        let result = normalizer.normalize(&input, dir.path(), 16000);
        assert!(matches!(result, Err(PipelineError::Conversion { .. })));
    }
}
