//! Output download and batch-archive handlers (§6).

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::security::is_safe_filename;
use crate::state::AppState;

fn content_type_for(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

/// Parses a single-range `Range: bytes=start-end` header against a known file length.
/// Multi-range requests are not supported; an unparseable or unsatisfiable range is ignored
/// in favor of a full 200 response, matching common CDN behavior.
fn parse_range(value: &str, file_len: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;

    if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 || suffix_len > file_len {
            return Some((0, file_len.saturating_sub(1)));
        }
        return Some((file_len - suffix_len, file_len - 1));
    }

    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() {
        file_len.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };

    if start > end || start >= file_len {
        return None;
    }
    Some((start, end.min(file_len.saturating_sub(1))))
}

/// `GET /output/{filename}`: streams an MP4 with Range support, 206 on partial requests.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::bad_request("invalid filename"));
    }

    let path = state.config.scratch_dir.join(&filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found("output not found"))?;
    let file_len = metadata.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, file_len));

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to open output: {e}")))?;

    let content_type = content_type_for(&filename);

    match range {
        Some((start, end)) => {
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::internal(format!("seek failed: {e}")))?;
            let mut buf = vec![0u8; length as usize];
            file.read_exact(&mut buf)
                .await
                .map_err(|e| ApiError::internal(format!("read failed: {e}")))?;

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_LENGTH, length)
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{file_len}"))
                .body(Body::from(buf))
                .map_err(|e| ApiError::internal(format!("failed to build response: {e}")))
        }
        None => {
            let mut buf = Vec::with_capacity(file_len as usize);
            file.read_to_end(&mut buf)
                .await
                .map_err(|e| ApiError::internal(format!("read failed: {e}")))?;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_LENGTH, file_len)
                .body(Body::from(buf))
                .map_err(|e| ApiError::internal(format!("failed to build response: {e}")))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDownloadRequest {
    pub filenames: Vec<String>,
    #[serde(default)]
    pub archive_name: Option<String>,
}

/// `POST /download/batch`: streams a ZIP archive of the requested output files.
pub async fn download_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchDownloadRequest>,
) -> ApiResult<Response> {
    if body.filenames.is_empty() {
        return Err(ApiError::bad_request("at least one filename is required"));
    }
    for filename in &body.filenames {
        if !is_safe_filename(filename) {
            return Err(ApiError::bad_request(format!("invalid filename: {filename}")));
        }
    }

    let mut entries = Vec::with_capacity(body.filenames.len());
    for filename in &body.filenames {
        let path = state.config.scratch_dir.join(filename);
        match tokio::fs::read(&path).await {
            Ok(bytes) => entries.push((filename.clone(), bytes)),
            Err(err) => {
                warn!(filename, error = %err, "output missing from batch download, skipping");
            }
        }
    }

    if entries.is_empty() {
        return Err(ApiError::not_found("none of the requested outputs exist"));
    }

    let archive = tokio::task::spawn_blocking(move || build_zip_archive(entries))
        .await
        .map_err(|e| ApiError::internal(format!("archive task panicked: {e}")))?
        .map_err(|e| ApiError::internal(format!("failed to build archive: {e}")))?;

    let archive_name = body.archive_name.unwrap_or_else(|| "outputs.zip".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{archive_name}\""),
        )
        .body(Body::from(archive))
        .map_err(|e| ApiError::internal(format!("failed to build response: {e}")))
}

fn build_zip_archive(entries: Vec<(String, Vec<u8>)>) -> zip::result::ZipResult<Vec<u8>> {
    use std::io::Write;

    let buf = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(buf);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        writer.start_file(name, options)?;
        writer.write_all(&bytes)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range("bytes=-100", 1000), Some((900, 999)));
    }

    #[test]
    fn rejects_out_of_bounds_start() {
        assert_eq!(parse_range("bytes=2000-3000", 1000), None);
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(parse_range("not-a-range", 1000), None);
    }
}
