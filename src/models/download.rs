//! Model download and installation management.
//!
//! Path helpers are always available; fetching over HTTP needs the
//! `model-download` feature.

#[cfg(feature = "model-download")]
use crate::error::{PipelineError, Result};
use crate::models::catalog::{self, ModelInfo};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "model-download")]
use futures_util::StreamExt;
#[cfg(feature = "model-download")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "model-download")]
use sha1::{Digest, Sha1};
#[cfg(feature = "model-download")]
use std::io::Write;

/// Default directory where models are stored: `~/.cache/sepscribe/models/`.
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("sepscribe")
        .join("models")
}

/// Full path for a model file in `dir`. The file may not exist.
pub fn model_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(catalog::filename_for(name))
}

pub fn is_model_installed(dir: &Path, name: &str) -> bool {
    model_path(dir, name).is_file()
}

/// Model names of every `ggml-*.bin` file in `dir`, sorted.
///
/// Catalog files are reported under their catalog name (`ggml-large-v3.bin`
/// is `large`); other files under their bare id.
pub fn list_installed_models(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let model = name.to_str()?.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            entry
                .path()
                .is_file()
                .then(|| catalog::name_for_file_id(model).to_string())
        })
        .collect();
    names.sort();
    names
}

/// One line of `models list` output.
pub fn format_model_info(dir: &Path, model: &ModelInfo) -> String {
    let status = if is_model_installed(dir, model.name) {
        "[installed]"
    } else {
        "[not installed]"
    };
    format!("{:12} {:5} MB   {}", model.name, model.size_mb, status)
}

/// Download a catalog model into `dir`.
///
/// Already-installed models are returned as-is. When `sha1` is given the
/// download is verified against it and removed on mismatch.
///
/// # Errors
/// Returns `PipelineError::Download` if the model is not in the catalog, the
/// request fails, or the checksum does not match.
#[cfg(feature = "model-download")]
pub async fn download_model(
    dir: &Path,
    name: &str,
    sha1: Option<&str>,
    progress: bool,
) -> Result<PathBuf> {
    let info = catalog::get_model(name).ok_or_else(|| PipelineError::Download {
        message: format!(
            "Unknown model '{}'. Available: {}",
            name,
            catalog::model_names()
        ),
    })?;

    let path = model_path(dir, name);
    if path.exists() {
        tracing::info!(model = name, path = %path.display(), "Model already installed");
        return Ok(path);
    }

    download_to_path(info, &path, sha1, progress).await?;
    Ok(path)
}

#[cfg(feature = "model-download")]
async fn download_to_path(
    info: &ModelInfo,
    output_path: &Path,
    sha1: Option<&str>,
    progress: bool,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let url = info.url();
    tracing::info!(model = info.name, size_mb = info.size_mb, %url, "Downloading model");

    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .map_err(|e| download_error(format!("Failed to start download: {e}")))?;

    if !response.status().is_success() {
        return Err(download_error(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let bar = if progress {
        let bar = ProgressBar::new(response.content_length().unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    // Stream to a partial file so an interrupted download never looks installed.
    let partial = output_path.with_extension("bin.part");
    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(&partial)?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_error(format!("Failed to read chunk: {e}")))?;
        file.write_all(&chunk)?;
        hasher.update(&chunk);
        if let Some(ref bar) = bar {
            bar.inc(chunk.len() as u64);
        }
    }
    file.flush()?;
    drop(file);

    if let Some(bar) = bar {
        bar.finish_with_message("Downloaded");
    }

    if let Some(expected) = sha1 {
        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            if let Err(e) = fs::remove_file(&partial) {
                tracing::warn!(error = %e, "Failed to remove corrupted download");
            }
            return Err(download_error(format!(
                "SHA-1 checksum mismatch. Expected: {expected}, got: {actual}"
            )));
        }
        tracing::info!(model = info.name, "Checksum verified");
    }

    fs::rename(&partial, output_path)?;
    tracing::info!(model = info.name, path = %output_path.display(), "Model installed");
    Ok(())
}

#[cfg(feature = "model-download")]
fn download_error(message: String) -> PipelineError {
    PipelineError::Download { message }
}
