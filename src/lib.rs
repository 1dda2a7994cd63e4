//! sepscribe - speech transcription with vocal separation
//!
//! Normalizes uploaded audio with ffmpeg, isolates vocals (demucs, falling
//! back to spectral gating), and transcribes with Whisper, chunking long
//! recordings into overlapping windows.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod process;
pub mod separation;
pub mod server;
pub mod stt;

// Seams
pub use process::{CommandExecutor, SystemCommandExecutor};
pub use separation::SeparationStrategy;
pub use stt::{ModelLoader, Transcriber};

// Pipeline
pub use pipeline::{AudioJob, JobConfig, Pipeline, PipelineResult};

// Error handling
pub use error::{JobError, PipelineError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
