//! API error types (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("too many active jobs")]
    TooManyActiveJobs { owner_active_jobs: u32, owner_job_limit: u32 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("media error: {0}")]
    Media(#[from] overlay_media::MediaError),

    #[error("queue error: {0}")]
    Queue(#[from] overlay_queue::QueueError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyActiveJobs { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Queue(overlay_queue::QueueError::TooManyActiveJobs { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Queue(overlay_queue::QueueError::NotFound) => StatusCode::NOT_FOUND,
        }
    }
}

fn redact_in_production(message: String) -> String {
    if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
        "an internal error occurred".to_string()
    } else {
        message
    }
}

/// Distinguishes genuine internal failures (ops/environment problems, safe to hide) from
/// ingest's deterministic client-input errors (`InvalidUrl`, `ProtocolNotAllowed`,
/// `SizeExceedsLimit`, `RemoteFetchFailed`, `WriteFailed`, `ProbeFailed`), whose messages
/// must surface even in production per §7's "500 with message" contract.
fn is_internal_media_error(err: &overlay_media::MediaError) -> bool {
    matches!(
        err,
        overlay_media::MediaError::MissingFfmpeg
            | overlay_media::MediaError::MissingFfprobe
            | overlay_media::MediaError::PipelineFailed { .. }
            | overlay_media::MediaError::IoFailure(_)
            | overlay_media::MediaError::PathIoFailure { .. }
    )
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_active_jobs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_job_limit: Option<u32>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (owner_active_jobs, owner_job_limit) = match &self {
            ApiError::TooManyActiveJobs {
                owner_active_jobs,
                owner_job_limit,
            } => (Some(*owner_active_jobs), Some(*owner_job_limit)),
            ApiError::Queue(overlay_queue::QueueError::TooManyActiveJobs {
                owner_active_jobs,
                owner_job_limit,
            }) => (Some(*owner_active_jobs), Some(*owner_job_limit)),
            _ => (None, None),
        };

        let detail = match &self {
            ApiError::Internal(_) => redact_in_production(self.to_string()),
            ApiError::Media(media_err) if is_internal_media_error(media_err) => {
                redact_in_production(self.to_string())
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            owner_active_jobs,
            owner_job_limit,
        };

        (status, Json(body)).into_response()
    }
}
