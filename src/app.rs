//! Composition root.
//!
//! Wires the configuration into a `Pipeline` and runs the long-lived
//! commands (HTTP service, in-process transcription).

use crate::audio::Normalizer;
use crate::config::Config;
use crate::error::JobError;
use crate::pipeline::{AudioJob, JobConfig, Pipeline, PipelineResult};
use crate::process::SystemCommandExecutor;
use crate::separation::Separator;
use crate::server::AppState;
use crate::stt::{ModelCache, WhisperModelLoader};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Build the production pipeline: ffmpeg normalizer, demucs → spectral-gate
/// separator and a Whisper model cache over `stt.models_dir`.
pub fn build_pipeline(config: &Config) -> Pipeline {
    let executor = Arc::new(SystemCommandExecutor::new());
    let normalizer = Normalizer::new(executor.clone(), config.tools.ffmpeg.clone());
    let separator = Separator::standard(
        executor,
        &config.tools.demucs,
        &config.tools.demucs_model,
        config.pipeline.noise_profile_secs,
    );
    let loader = WhisperModelLoader::new(config.stt.models_dir(), config.stt.threads);

    Pipeline::new(
        normalizer,
        separator,
        Arc::new(ModelCache::new(loader)),
        config.pipeline.chunking(),
    )
}

/// Load every model listed in `stt.preload`. Failures are logged, not fatal.
pub fn preload_models(pipeline: &Pipeline, sizes: &[String]) -> usize {
    let mut loaded = 0;
    for size in sizes {
        match pipeline.models().get(size) {
            Ok(_) => {
                tracing::info!(model = %size, "Preloaded model");
                loaded += 1;
            }
            Err(e) => tracing::warn!(model = %size, error = %e, "Failed to preload model"),
        }
    }
    loaded
}

/// Run the HTTP service until Ctrl-C.
pub async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    config.validate()?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let pipeline = Arc::new(build_pipeline(&config));
    tracing::info!(
        separation = ?pipeline.separator().strategy_names(),
        models_dir = %config.stt.models_dir().display(),
        backend = crate::defaults::gpu_backend(),
        "Pipeline ready"
    );

    if !config.stt.preload.is_empty() {
        let preload = config.stt.preload.clone();
        let warm = pipeline.clone();
        tokio::task::spawn_blocking(move || preload_models(&warm, &preload))
            .await
            .context("Model preload task failed")?;
    }

    let state = AppState::new(pipeline, config.server.max_upload_bytes)
        .with_workspace_root(config.server.workspace_root.clone());

    crate::server::serve(state, &host, port).await
}

/// Options for an in-process transcription.
#[derive(Debug, Default, Clone)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub model: Option<String>,
    pub no_separation: bool,
    pub diarize: bool,
    pub sample_rate: Option<u32>,
}

impl TranscribeOptions {
    /// Job config with the command-line overrides applied over the defaults.
    pub fn job_config(&self) -> JobConfig {
        let defaults = JobConfig::default();
        JobConfig {
            language_hint: self.language.clone(),
            enable_separation: !self.no_separation,
            diarize: self.diarize,
            model_size: self.model.clone().unwrap_or(defaults.model_size),
            target_sr: self.sample_rate.unwrap_or(defaults.target_sr),
        }
    }
}

/// Run one file through the pipeline on a blocking thread.
pub async fn run_transcribe(
    config: Config,
    file: PathBuf,
    options: TranscribeOptions,
) -> Result<PipelineResult> {
    config.validate()?;
    if !file.exists() {
        anyhow::bail!("Input file not found: {}", file.display());
    }

    let job_config = options.job_config();
    job_config.validate()?;

    let request_id = uuid::Uuid::new_v4().to_string();
    let workspace_root = config.server.workspace_root.clone();
    let pipeline = build_pipeline(&config);

    let result = tokio::task::spawn_blocking(move || {
        let job = AudioJob::new(request_id.clone(), file, job_config, workspace_root.as_deref())
            .map_err(|e| JobError::new(request_id, e))?;
        pipeline.run(job)
    })
    .await
    .context("Transcription task failed")?
    .map_err(|e| anyhow::anyhow!("[{}] {}", e.request_id, e.error))?;

    Ok(result)
}
