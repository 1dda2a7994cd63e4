//! Error types for sepscribe.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    Configuration { key: String, message: String },

    // External tool errors
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    // Stage errors
    #[error("Audio conversion failed: {message}")]
    Conversion { message: String },

    #[error("Source separation failed: {message}")]
    Separation { message: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Model download failed: {message}")]
    Download { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Whether the error comes from the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration { .. }
                | PipelineError::ConfigParse { .. }
                | PipelineError::Conversion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A fatal pipeline error tagged with the request it belongs to.
#[derive(Debug)]
pub struct JobError {
    pub request_id: String,
    pub error: PipelineError,
}

impl JobError {
    pub fn new(request_id: impl Into<String>, error: PipelineError) -> Self {
        Self {
            request_id: request_id.into(),
            error,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.request_id, self.error)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
