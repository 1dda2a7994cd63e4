//! Client for a running sepscribe service.

use anyhow::{Context, Result};
use reqwest::multipart;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:8000/v1/transcribe";

/// Default request timeout; the only cancellation boundary for a job.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Status and raw body returned by the service.
#[derive(Debug)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: String,
}

impl SubmitResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Re-indent a JSON body; non-JSON bodies are returned unchanged.
    pub fn pretty_body(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| self.body.clone())
    }
}

/// Read a job config file and re-serialize it compactly for the `config` field.
pub fn read_config_json(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(value.to_string())
}

/// Timeout to apply to a submission, falling back to [`DEFAULT_TIMEOUT`].
pub fn request_timeout(requested: Option<Duration>) -> Duration {
    requested.unwrap_or(DEFAULT_TIMEOUT)
}

/// Upload `audio` (and an optional JSON job config) to `url`.
///
/// Non-2xx responses are returned, not turned into errors.
pub async fn submit(
    url: &str,
    audio: &Path,
    config_json: Option<String>,
    timeout: Option<Duration>,
) -> Result<SubmitResponse> {
    let bytes = tokio::fs::read(audio)
        .await
        .with_context(|| format!("Failed to read {}", audio.display()))?;
    let file_name = audio
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut form =
        multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));
    if let Some(config) = config_json {
        form = form.text("config", config);
    }

    let client = reqwest::Client::builder()
        .timeout(request_timeout(timeout))
        .build()
        .context("Failed to build HTTP client")?;

    tracing::debug!(%url, file = %audio.display(), "Uploading audio");

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    Ok(SubmitResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pretty_body_indents_json() {
        let response = SubmitResponse {
            status: 200,
            body: r#"{"text":"hi"}"#.to_string(),
        };
        assert!(response.pretty_body().contains("\n"));
        assert!(response.is_success());
    }

    #[test]
    fn pretty_body_passes_through_plain_text() {
        let response = SubmitResponse {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(response.pretty_body(), "Bad Gateway");
        assert!(!response.is_success());
    }

    #[test]
    fn request_timeout_defaults_to_ten_minutes() {
        assert_eq!(request_timeout(None), Duration::from_secs(600));
        assert_eq!(
            request_timeout(Some(Duration::from_secs(90))),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn read_config_json_compacts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\n  \"model_size\": \"tiny\"\n}}").unwrap();
        assert_eq!(
            read_config_json(file.path()).unwrap(),
            r#"{"model_size":"tiny"}"#
        );
    }

    #[test]
    fn read_config_json_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_config_json(file.path()).is_err());
    }
}
