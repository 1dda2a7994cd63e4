//! Per-request job state and configuration.

use crate::defaults;
use crate::error::{PipelineError, Result};
use crate::models::catalog;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Caller-supplied options for one transcription job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// ISO language code; empty or "auto" lets the model detect it.
    pub language_hint: Option<String>,
    pub enable_separation: bool,
    pub diarize: bool,
    pub model_size: String,
    #[serde(alias = "target_sample_rate")]
    pub target_sr: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            language_hint: None,
            enable_separation: true,
            diarize: false,
            model_size: defaults::DEFAULT_MODEL.to_string(),
            target_sr: defaults::SAMPLE_RATE,
        }
    }
}

impl JobConfig {
    /// Parse the JSON form sent by clients.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::ConfigParse {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(defaults::MIN_SAMPLE_RATE..=defaults::MAX_SAMPLE_RATE).contains(&self.target_sr) {
            return Err(PipelineError::Configuration {
                key: "target_sr".to_string(),
                message: format!(
                    "must be between {} and {}, got {}",
                    defaults::MIN_SAMPLE_RATE,
                    defaults::MAX_SAMPLE_RATE,
                    self.target_sr
                ),
            });
        }
        if catalog::get_model(&self.model_size).is_none() {
            return Err(PipelineError::Configuration {
                key: "model_size".to_string(),
                message: format!(
                    "unknown model '{}' (available: {})",
                    self.model_size,
                    catalog::model_names()
                ),
            });
        }
        Ok(())
    }

    /// Language hint to pass to the model, if any.
    pub fn language(&self) -> Option<&str> {
        self.language_hint
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case(defaults::AUTO_LANGUAGE))
    }
}

/// One request's working state.
///
/// Owns a scoped workspace directory; every intermediate file of the job is
/// written there and removed when the job is dropped or closed.
#[derive(Debug)]
pub struct AudioJob {
    request_id: String,
    input_path: PathBuf,
    workspace: TempDir,
    config: JobConfig,
}

impl AudioJob {
    /// Job over an existing file. The file itself is never modified.
    pub fn new(
        request_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        config: JobConfig,
        workspace_root: Option<&Path>,
    ) -> Result<Self> {
        let request_id = request_id.into();
        let workspace = create_workspace(&request_id, workspace_root)?;
        Ok(Self {
            request_id,
            input_path: input_path.into(),
            workspace,
            config,
        })
    }

    /// Job over uploaded bytes, stored inside the job workspace.
    ///
    /// Only the extension of `filename` is kept, so client-supplied names
    /// never influence where the file lands.
    pub fn from_upload(
        request_id: impl Into<String>,
        filename: Option<&str>,
        bytes: &[u8],
        config: JobConfig,
        workspace_root: Option<&Path>,
    ) -> Result<Self> {
        let request_id = request_id.into();
        let workspace = create_workspace(&request_id, workspace_root)?;
        let input_path = workspace.path().join(upload_name(filename));
        std::fs::write(&input_path, bytes)?;
        Ok(Self {
            request_id,
            input_path,
            workspace,
            config,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Remove the workspace, logging instead of failing if that goes wrong.
    pub fn close(self) {
        let path = self.workspace.path().to_path_buf();
        if let Err(e) = self.workspace.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove job workspace");
        }
    }
}

fn create_workspace(request_id: &str, root: Option<&Path>) -> Result<TempDir> {
    let prefix = format!("req_{}_", sanitize(request_id));
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect()
}

fn upload_name(filename: Option<&str>) -> String {
    let extension = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|e| e.to_str())
        .map(|e| sanitize(e).to_lowercase())
        .filter(|e| !e.is_empty());
    match extension {
        Some(ext) => format!("upload.{ext}"),
        None => "upload".to_string(),
    }
}
