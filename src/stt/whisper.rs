//! Whisper-based speech-to-text transcription.
//!
//! This module provides a Whisper implementation of the Transcriber trait using whisper-rs.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake to build
//! whisper.cpp). Without it, `WhisperTranscriber` still validates the model
//! path but every transcription returns an error.

use crate::audio::Waveform;
use crate::defaults;
use crate::error::{PipelineError, Result};
use crate::stt::transcriber::{Transcriber, TranscriptionResult};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use crate::stt::transcriber::Segment;
#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the `ggml-*.bin` model file
    pub model_path: PathBuf,
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

/// Model name derived from a whisper.cpp file name (`ggml-base.en.bin` -> `base.en`).
fn model_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    stem.strip_prefix("ggml-").unwrap_or(stem).to_string()
}

/// Load a WAV and bring it to the 16kHz Whisper expects.
fn load_samples(wav: &Path) -> Result<Vec<f32>> {
    let waveform = Waveform::read(wav).map_err(|e| PipelineError::Transcription {
        message: e.to_string(),
    })?;
    Ok(waveform.resampled(defaults::SAMPLE_RATE).into_samples())
}

fn ensure_model_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::Transcription {
            message: format!("Model file not found: {}", path.display()),
        })
    }
}

/// Whisper-based transcriber.
///
/// The WhisperContext is wrapped in a Mutex; each call creates its own state.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper transcriber placeholder used when the `whisper` feature is off.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Load a model.
    ///
    /// # Errors
    /// Returns `PipelineError::Transcription` if the model file is missing or
    /// whisper.cpp cannot load it.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Route whisper.cpp output through the log hooks (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        ensure_model_exists(&config.model_path)?;
        let model_name = model_name_from_path(&config.model_path);

        let model_path = config
            .model_path
            .to_str()
            .ok_or_else(|| PipelineError::Transcription {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context =
            WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
                .map_err(|e| PipelineError::Transcription {
                    message: format!("Failed to load Whisper model: {}", e),
                })?;

        tracing::info!(model = %model_name, path = %config.model_path.display(), "Whisper model loaded");

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Validate the model path (stub implementation).
    pub fn new(config: WhisperConfig) -> Result<Self> {
        ensure_model_exists(&config.model_path)?;
        let model_name = model_name_from_path(&config.model_path);
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, wav: &Path, language: Option<&str>) -> Result<TranscriptionResult> {
        let audio = load_samples(wav)?;

        let context = self
            .context
            .lock()
            .map_err(|e| PipelineError::Transcription {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| PipelineError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio)
            .map_err(|e| PipelineError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let lang_id = state.full_lang_id_from_state();
        let detected = whisper_rs::get_lang_str(lang_id)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        // Segment timestamps are in centiseconds.
        let segments: Vec<Segment> = state
            .as_iter()
            .map(|segment| {
                Segment::new(
                    segment.start_timestamp() as f64 / 100.0,
                    segment.end_timestamp() as f64 / 100.0,
                    segment.to_string(),
                )
            })
            .collect();

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<String>()
            .trim()
            .to_string();

        tracing::debug!(
            model = %self.model_name,
            segments = segments.len(),
            language = detected.as_deref().unwrap_or(""),
            "Whisper transcription finished"
        );

        Ok(TranscriptionResult {
            text,
            language: detected,
            segments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, wav: &Path, _language: Option<&str>) -> Result<TranscriptionResult> {
        load_samples(wav)?;
        Err(PipelineError::Transcription {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
