//! Media-layer error taxonomy (§4.1 / §4.2 of the service contract).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg binary not found on PATH")]
    MissingFfmpeg,

    #[error("ffprobe binary not found on PATH")]
    MissingFfprobe,

    #[error("render pipeline failed (exit code {exit_code:?}): {stderr_tail}")]
    PipelineFailed { stderr_tail: String, exit_code: Option<i32> },

    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("io failure reading/writing {path}: {source}")]
    PathIoFailure { path: PathBuf, source: std::io::Error },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("protocol not allowed: {0}")]
    ProtocolNotAllowed(String),

    #[error("declared size {declared} exceeds limit {limit}")]
    SizeExceedsLimit { declared: u64, limit: u64 },

    #[error("remote fetch failed: {0}")]
    RemoteFetchFailed(String),

    #[error("failed to write downloaded asset: {0}")]
    WriteFailed(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),
}

impl MediaError {
    pub fn pipeline_failed(stderr: &str, exit_code: Option<i32>) -> Self {
        let tail: String = stderr
            .lines()
            .rev()
            .take(20)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        Self::PipelineFailed {
            stderr_tail: tail,
            exit_code,
        }
    }
}
