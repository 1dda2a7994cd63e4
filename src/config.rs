use crate::defaults;
use crate::error::{PipelineError, Result};
use crate::pipeline::ChunkingPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub tools: ToolsConfig,
    pub stt: SttConfig,
    pub logging: LoggingConfig,
}

/// HTTP service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Parent directory for per-job workspaces (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,
}

/// Chunking and separation tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_threshold_secs: f64,
    pub chunk_length_secs: f64,
    pub overlap_secs: f64,
    pub noise_profile_secs: f64,
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub demucs: String,
    pub demucs_model: String,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SttConfig {
    /// Model directory (`~/.cache/sepscribe/models` if unset)
    pub models_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    /// Model sizes loaded when the server starts
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            workspace_root: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_secs: defaults::CHUNK_THRESHOLD_SECS,
            chunk_length_secs: defaults::CHUNK_LENGTH_SECS,
            overlap_secs: defaults::CHUNK_OVERLAP_SECS,
            noise_profile_secs: defaults::NOISE_PROFILE_SECS,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: defaults::FFMPEG.to_string(),
            demucs: defaults::DEMUCS.to_string(),
            demucs_model: defaults::DEMUCS_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn chunking(&self) -> ChunkingPolicy {
        ChunkingPolicy {
            threshold_secs: self.chunk_threshold_secs,
            chunk_length_secs: self.chunk_length_secs,
            overlap_secs: self.overlap_secs,
        }
    }
}

impl SttConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(crate::models::models_dir)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SEPSCRIBE_FFMPEG → tools.ffmpeg
    /// - SEPSCRIBE_DEMUCS → tools.demucs
    /// - SEPSCRIBE_MODELS_DIR → stt.models_dir
    /// - SEPSCRIBE_HOST → server.host
    /// - SEPSCRIBE_PORT → server.port (ignored if not a valid port)
    /// - LOG_FORMAT=json → logging.json
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(ffmpeg) = std::env::var("SEPSCRIBE_FFMPEG")
            && !ffmpeg.is_empty()
        {
            self.tools.ffmpeg = ffmpeg;
        }

        if let Ok(demucs) = std::env::var("SEPSCRIBE_DEMUCS")
            && !demucs.is_empty()
        {
            self.tools.demucs = demucs;
        }

        if let Ok(dir) = std::env::var("SEPSCRIBE_MODELS_DIR")
            && !dir.is_empty()
        {
            self.stt.models_dir = Some(PathBuf::from(dir));
        }

        if let Ok(host) = std::env::var("SEPSCRIBE_HOST")
            && !host.is_empty()
        {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("SEPSCRIBE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) if port.is_empty() => {}
                Err(e) => eprintln!("Warning: ignoring invalid SEPSCRIBE_PORT {port:?}: {e}"),
            }
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json = format.eq_ignore_ascii_case("json");
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        let invalid = |key: &str, message: String| {
            Err(PipelineError::Configuration {
                key: format!("pipeline.{key}"),
                message,
            })
        };
        if !(p.chunk_length_secs > 0.0) {
            return invalid("chunk_length_secs", "must be positive".to_string());
        }
        if !(p.overlap_secs >= 0.0) {
            return invalid("overlap_secs", "must not be negative".to_string());
        }
        if p.overlap_secs >= p.chunk_length_secs {
            return invalid(
                "overlap_secs",
                format!(
                    "must be smaller than chunk_length_secs ({})",
                    p.chunk_length_secs
                ),
            );
        }
        if !(p.chunk_threshold_secs > 0.0) {
            return invalid("chunk_threshold_secs", "must be positive".to_string());
        }
        if !(p.noise_profile_secs > 0.0) {
            return invalid("noise_profile_secs", "must be positive".to_string());
        }
        if self.server.max_upload_bytes == 0 {
            return Err(PipelineError::Configuration {
                key: "server.max_upload_bytes".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/sepscribe/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("sepscribe")
            .join("config.toml")
    }
}
