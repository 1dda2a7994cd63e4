use crate::error::{JobError, PipelineError};
use crate::pipeline::{AudioJob, JobConfig};
use crate::server::request_id::RequestId;
use crate::server::state::AppState;
use axum::Json;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: crate::version_string(),
        }),
    )
}

/// Parsed multipart form.
struct Upload {
    filename: Option<String>,
    bytes: Vec<u8>,
    config: Option<String>,
}

#[derive(Debug)]
enum UploadError {
    MissingFile,
    TooLarge { max_bytes: usize },
    Multipart(MultipartError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Multipart(e) => e.status(),
        }
    }

    fn message(&self) -> String {
        match self {
            UploadError::MissingFile => "Missing required form field 'file'".to_string(),
            UploadError::TooLarge { max_bytes } => {
                format!("File too large (max {}MB)", max_bytes / (1024 * 1024))
            }
            UploadError::Multipart(e) => format!("Failed to read multipart body: {}", e.body_text()),
        }
    }
}

async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Upload, UploadError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut config = None;

    while let Some(mut field) = multipart.next_field().await.map_err(UploadError::Multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(UploadError::Multipart)? {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(UploadError::TooLarge { max_bytes });
                    }
                    bytes.extend_from_slice(&chunk);
                }
                file = Some((filename, bytes));
            }
            Some("config") => {
                config = Some(field.text().await.map_err(UploadError::Multipart)?);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown form field");
            }
        }
    }

    let (filename, bytes) = file.ok_or(UploadError::MissingFile)?;
    Ok(Upload {
        filename,
        bytes,
        config,
    })
}

fn error_response(status: StatusCode, request_id: &str, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            request_id: request_id.to_string(),
            error: error.into(),
        }),
    )
        .into_response()
}

/// HTTP status for a fatal pipeline error.
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Configuration { .. } | PipelineError::ConfigParse { .. } => {
            StatusCode::BAD_REQUEST
        }
        PipelineError::Conversion { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_config(raw: Option<&str>) -> Result<JobConfig, (StatusCode, String)> {
    let config = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(json) => JobConfig::from_json(json)
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid config JSON".to_string()))?,
        None => JobConfig::default(),
    };
    config
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(config)
}

/// `POST /v1/transcribe`
pub async fn transcribe_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    mut multipart: Multipart,
) -> Response {
    let upload = match read_upload(&mut multipart, state.max_upload_bytes).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(error = %e.message(), "Rejected upload");
            return error_response(e.status(), &request_id, e.message());
        }
    };

    let config = match parse_config(upload.config.as_deref()) {
        Ok(config) => config,
        Err((status, message)) => {
            tracing::warn!(error = %message, "Rejected job config");
            return error_response(status, &request_id, message);
        }
    };

    tracing::info!(
        bytes = upload.bytes.len(),
        filename = upload.filename.as_deref().unwrap_or(""),
        model = %config.model_size,
        separation = config.enable_separation,
        "Accepted upload"
    );

    let pipeline = state.pipeline.clone();
    let workspace_root = state.workspace_root.clone();
    let id = request_id.clone();
    let span = tracing::Span::current();
    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let job = AudioJob::from_upload(
            id.clone(),
            upload.filename.as_deref(),
            &upload.bytes,
            config,
            workspace_root.as_deref(),
        )
        .map_err(|e| JobError::new(id, e))?;
        pipeline.run(job)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(job_error)) => error_response(
            status_for(&job_error.error),
            &job_error.request_id,
            job_error.error.to_string(),
        ),
        Err(join_error) => {
            tracing::error!(error = %join_error, "Pipeline task panicked");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &request_id,
                "Internal error while processing audio",
            )
        }
    }
}
