//! `ingest`: downloads a client-supplied remote asset into scratch storage (§4.1).

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{MediaError, Result};

/// 2 GiB, per §4.1's declared-size ceiling.
pub const MAX_DECLARED_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// A client-supplied remote asset reference, as received in the enqueue request body.
#[derive(Debug, Clone)]
pub struct RemoteRef {
    pub url: String,
    pub original_name: String,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

/// A downloaded asset, resident in scratch storage.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub scratch_path: PathBuf,
    pub original_name: String,
}

fn slugify(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

fn validate_url(url: &str, allow_insecure_loopback: bool) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| MediaError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" => {
            let host_is_loopback = matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("::1")
            );
            if allow_insecure_loopback && host_is_loopback {
                Ok(parsed)
            } else {
                Err(MediaError::ProtocolNotAllowed(
                    "http is only allowed to loopback hosts in development mode".into(),
                ))
            }
        }
        other => Err(MediaError::ProtocolNotAllowed(other.to_string())),
    }
}

/// Downloads `remote.url` into `{scratch_dir}/{label_slug}_{uuid}{ext}`, honoring the
/// HTTPS-only (or dev-mode loopback HTTP) and declared-size constraints.
pub async fn ingest(
    client: &reqwest::Client,
    scratch_dir: &Path,
    remote: &RemoteRef,
    label: &str,
    allow_insecure_loopback: bool,
) -> Result<LocalAsset> {
    let url = validate_url(&remote.url, allow_insecure_loopback)?;

    if let Some(declared) = remote.size {
        if declared > MAX_DECLARED_SIZE_BYTES {
            return Err(MediaError::SizeExceedsLimit {
                declared,
                limit: MAX_DECLARED_SIZE_BYTES,
            });
        }
    }

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| MediaError::RemoteFetchFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(MediaError::RemoteFetchFailed(format!(
            "status {} for {url}",
            response.status()
        )));
    }

    let filename = format!(
        "{}_{}{}",
        slugify(label),
        Uuid::new_v4(),
        extension_of(&remote.original_name)
    );
    let scratch_path = scratch_dir.join(&filename);

    let mut file = tokio::fs::File::create(&scratch_path)
        .await
        .map_err(|e| MediaError::WriteFailed(e.to_string()))?;

    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::RemoteFetchFailed(e.to_string()))?;
        total_bytes += chunk.len() as u64;
        if total_bytes > MAX_DECLARED_SIZE_BYTES {
            warn!(label, "download exceeded size limit mid-stream, aborting");
            let _ = tokio::fs::remove_file(&scratch_path).await;
            return Err(MediaError::SizeExceedsLimit {
                declared: total_bytes,
                limit: MAX_DECLARED_SIZE_BYTES,
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| MediaError::WriteFailed(e.to_string()))?;
    }
    file.flush().await.map_err(|e| MediaError::WriteFailed(e.to_string()))?;

    if total_bytes == 0 {
        let _ = tokio::fs::remove_file(&scratch_path).await;
        return Err(MediaError::RemoteFetchFailed("empty response body".into()));
    }

    info!(label, bytes = total_bytes, path = %scratch_path.display(), "ingested remote asset");

    Ok(LocalAsset {
        scratch_path,
        original_name: remote.original_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_are_always_allowed() {
        assert!(validate_url("https://example.com/video.mp4", false).is_ok());
    }

    #[test]
    fn http_is_rejected_without_dev_flag() {
        assert!(validate_url("http://example.com/video.mp4", false).is_err());
    }

    #[test]
    fn http_to_loopback_allowed_only_in_dev_mode() {
        assert!(validate_url("http://localhost:9000/v.mp4", true).is_ok());
        assert!(validate_url("http://localhost:9000/v.mp4", false).is_err());
        assert!(validate_url("http://example.com/v.mp4", true).is_err());
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(validate_url("ftp://example.com/v.mp4", true).is_err());
        assert!(validate_url("not a url", true).is_err());
    }

    #[test]
    fn extension_is_derived_from_original_name() {
        assert_eq!(extension_of("clip.MP4"), ".MP4");
        assert_eq!(extension_of("noext"), "");
    }
}
