//! Scratch-directory cleanup helpers.

use std::path::Path;

use tracing::warn;

/// Deletes every path in `paths`, logging and swallowing individual failures
/// (§7 `CleanupFailed`: warning log only, never surfaced).
pub async fn delete_scratch_files(paths: impl IntoIterator<Item = impl AsRef<Path>>) {
    for path in paths {
        let path = path.as_ref();
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to delete scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn deletes_existing_files_and_ignores_missing_ones() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("a.mp4");
        tokio::fs::write(&existing, b"data").await.unwrap();
        let missing = dir.path().join("missing.mp4");

        delete_scratch_files([&existing, &missing]).await;

        assert!(!existing.exists());
    }
}
