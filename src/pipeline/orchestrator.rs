//! Job orchestration: normalize, separate, transcribe, assemble.

use crate::audio::{Normalizer, Waveform};
use crate::defaults;
use crate::error::{JobError, PipelineError, Result};
use crate::pipeline::chunk::ChunkingPolicy;
use crate::pipeline::job::AudioJob;
use crate::pipeline::stitch::{self, Stitcher, round3};
use crate::pipeline::timings::{Timings, elapsed_ms, timed};
use crate::pipeline::types::{
    Diarization, PipelineInfo, PipelineResult, SeparationInfo, TranscriptResult,
    TranscriptionInfo,
};
use crate::separation::Separator;
use crate::stt::{ModelCache, TranscriptionResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// The audio processing pipeline.
///
/// Stateless apart from the shared model cache, so one instance serves any
/// number of concurrent jobs.
pub struct Pipeline {
    normalizer: Normalizer,
    separator: Separator,
    models: Arc<ModelCache>,
    chunking: ChunkingPolicy,
}

impl Pipeline {
    pub fn new(
        normalizer: Normalizer,
        separator: Separator,
        models: Arc<ModelCache>,
        chunking: ChunkingPolicy,
    ) -> Self {
        Self {
            normalizer,
            separator,
            models,
            chunking,
        }
    }

    pub fn models(&self) -> &Arc<ModelCache> {
        &self.models
    }

    pub fn chunking(&self) -> &ChunkingPolicy {
        &self.chunking
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    /// Run a job to completion. The job's workspace is removed before this
    /// returns, on success and on failure.
    pub fn run(&self, job: AudioJob) -> std::result::Result<PipelineResult, JobError> {
        let request_id = job.request_id().to_string();
        let span = tracing::info_span!("job", request_id = %request_id);
        let _guard = span.enter();

        let result = self.execute(&job);
        job.close();

        match result {
            Ok(result) => {
                tracing::info!(
                    total_ms = result.timings_ms.total,
                    method = %result.pipeline.separation.method,
                    "Job finished"
                );
                Ok(result)
            }
            Err(error) => {
                tracing::error!(%error, "Job failed");
                Err(JobError::new(request_id, error))
            }
        }
    }

    fn execute(&self, job: &AudioJob) -> Result<PipelineResult> {
        let started = Instant::now();
        let config = job.config();
        config.validate()?;
        let language_hint = config.language();

        let (normalized, load_ms) = timed(|| {
            self.normalizer
                .normalize(job.input_path(), job.workspace(), config.target_sr)
        });
        let normalized = normalized?;
        let duration = normalized.info.duration_secs;
        tracing::info!(
            stage = "normalize",
            duration_secs = duration,
            sample_rate = normalized.info.sample_rate,
            "Audio normalized"
        );

        let (separation, separation_ms) = timed(|| {
            self.separator
                .separate(&normalized.path, job.workspace(), config.enable_separation)
        });

        let (transcript, transcription_ms) = if self.chunking.uses_chunking(duration) {
            tracing::info!(stage = "transcribe", duration_secs = duration, "Long audio, chunking");
            self.transcribe_long(&separation.path, &config.model_size, language_hint)?
        } else {
            let (raw, ms) = self.transcribe(&config.model_size, &separation.path, language_hint)?;
            (stitch::single(&raw), ms)
        };

        let diarization = if config.diarize {
            tracing::warn!("Diarization requested but not implemented");
            Some(Diarization::not_implemented())
        } else {
            None
        };

        let language = transcript
            .language
            .clone()
            .or_else(|| language_hint.map(str::to_string))
            .unwrap_or_else(|| defaults::UNDETERMINED_LANGUAGE.to_string());

        Ok(PipelineResult {
            request_id: job.request_id().to_string(),
            duration_sec: round3(duration),
            sample_rate: normalized.info.sample_rate,
            pipeline: PipelineInfo {
                separation: SeparationInfo {
                    enabled: config.enable_separation,
                    method: separation.method,
                    attempts: separation.attempts,
                },
                transcription: TranscriptionInfo {
                    model: config.model_size.clone(),
                },
            },
            segments: transcript.segments,
            text: transcript.text,
            language,
            timings_ms: Timings {
                load: load_ms,
                separation: separation_ms,
                transcription: transcription_ms,
                total: elapsed_ms(started),
            },
            diarization,
        })
    }

    /// Transcribe one waveform with the cached model for `model_size`.
    ///
    /// The elapsed time includes loading the model on first use.
    pub fn transcribe(
        &self,
        model_size: &str,
        wav: &Path,
        language: Option<&str>,
    ) -> Result<(TranscriptionResult, u64)> {
        let started = Instant::now();
        let model = self.models.get(model_size)?;
        let result = model.transcribe(wav, language)?;
        Ok((result, elapsed_ms(started)))
    }

    /// Transcribe overlapping windows of `wav` and stitch them.
    ///
    /// Returns the summed per-window transcription time.
    pub fn transcribe_long(
        &self,
        wav: &Path,
        model_size: &str,
        language: Option<&str>,
    ) -> Result<(TranscriptResult, u64)> {
        let waveform = Waveform::read(wav).map_err(|e| PipelineError::Transcription {
            message: format!("Cannot read audio for chunking: {}", e),
        })?;
        let windows = self.chunking.windows(waveform.duration_secs());
        tracing::info!(
            chunks = windows.len(),
            chunk_length_secs = self.chunking.chunk_length_secs,
            overlap_secs = self.chunking.overlap_secs,
            "Chunking audio"
        );

        let mut stitcher = Stitcher::new();
        let mut transcription_ms = 0;
        for window in &windows {
            let chunk_path = chunk_path(wav, window.index);
            waveform
                .slice_secs(window.start_secs, window.end_secs)
                .write(&chunk_path)?;

            let outcome = self.transcribe(model_size, &chunk_path, language);
            if let Err(e) = std::fs::remove_file(&chunk_path) {
                tracing::debug!(path = %chunk_path.display(), error = %e, "Failed to remove chunk file");
            }

            let (result, ms) = outcome?;
            transcription_ms += ms;
            stitcher.push_chunk(window.start_secs, &result);
        }

        Ok((stitcher.finish(), transcription_ms))
    }
}

/// `<wav>.chunk<i>.wav` next to the source waveform.
fn chunk_path(wav: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(wav.as_os_str());
    name.push(format!(".chunk{index}.wav"));
    PathBuf::from(name)
}
