//! Best-effort source separation.
//!
//! Strategies are tried in rank order and the first success wins. When every
//! strategy fails, the normalized waveform is used as-is. Separation never
//! fails a job: the worst case is transcribing the unprocessed audio.

pub mod demucs;
pub mod spectral_gate;

pub use demucs::DemucsSeparator;
pub use spectral_gate::{SpectralGate, SpectralGateConfig, SpectralGateSeparator};

use crate::error::{PipelineError, Result};
use crate::process::CommandExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which separation path produced the waveform handed to transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeparationMethod {
    PrimaryModel,
    FallbackNoiseReduction,
    Disabled,
    FailedFallbackToOriginal,
}

impl SeparationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeparationMethod::PrimaryModel => "primary-model",
            SeparationMethod::FallbackNoiseReduction => "fallback-noise-reduction",
            SeparationMethod::Disabled => "disabled",
            SeparationMethod::FailedFallbackToOriginal => "failed-fallback-to-original",
        }
    }
}

impl fmt::Display for SeparationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of isolating speech from a waveform.
pub trait SeparationStrategy: Send + Sync {
    /// Short identifier used in logs and the attempt chain.
    fn name(&self) -> &str;

    /// Tag reported when this strategy succeeds.
    fn method(&self) -> SeparationMethod;

    /// Produce a speech waveform from `input`, writing into `workspace`.
    fn separate(&self, input: &Path, workspace: &Path) -> Result<PathBuf>;
}

/// Record of a single strategy attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationAttempt {
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the separation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationOutcome {
    /// Waveform to transcribe.
    pub path: PathBuf,
    pub method: SeparationMethod,
    pub attempts: Vec<SeparationAttempt>,
}

/// Ranked chain of separation strategies.
pub struct Separator {
    strategies: Vec<Box<dyn SeparationStrategy>>,
}

impl Separator {
    pub fn new(strategies: Vec<Box<dyn SeparationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Demucs first, spectral gating second.
    pub fn standard(
        executor: Arc<dyn CommandExecutor>,
        demucs: &str,
        demucs_model: &str,
        noise_profile_secs: f64,
    ) -> Self {
        Self::new(vec![
            Box::new(DemucsSeparator::new(executor, demucs, demucs_model)),
            Box::new(SpectralGateSeparator::new(SpectralGate::new(
                SpectralGateConfig {
                    noise_profile_secs,
                    ..SpectralGateConfig::default()
                },
            ))),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain on `input`.
    ///
    /// Always returns an outcome; failures are logged and recorded in
    /// `attempts`.
    pub fn separate(&self, input: &Path, workspace: &Path, enabled: bool) -> SeparationOutcome {
        if !enabled {
            return SeparationOutcome {
                path: input.to_path_buf(),
                method: SeparationMethod::Disabled,
                attempts: Vec::new(),
            };
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match run_strategy(strategy.as_ref(), input, workspace) {
                Ok(path) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        method = %strategy.method(),
                        "Separation succeeded"
                    );
                    attempts.push(SeparationAttempt {
                        strategy: strategy.name().to_string(),
                        error: None,
                    });
                    return SeparationOutcome {
                        path,
                        method: strategy.method(),
                        attempts,
                    };
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Separation strategy failed");
                    attempts.push(SeparationAttempt {
                        strategy: strategy.name().to_string(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        tracing::warn!("All separation strategies failed, using original audio");
        SeparationOutcome {
            path: input.to_path_buf(),
            method: SeparationMethod::FailedFallbackToOriginal,
            attempts,
        }
    }
}

fn run_strategy(
    strategy: &dyn SeparationStrategy,
    input: &Path,
    workspace: &Path,
) -> Result<PathBuf> {
    panic::catch_unwind(AssertUnwindSafe(|| strategy.separate(input, workspace))).unwrap_or_else(
        |panic_info| {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            Err(PipelineError::Separation {
                message: format!("{} panicked: {}", strategy.name(), msg),
            })
        },
    )
}
