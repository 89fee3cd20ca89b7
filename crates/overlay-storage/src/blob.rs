//! Blob object-store snapshot fallback (S3-compatible). Presence of `BLOB_*` env vars
//! toggles this on.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::warn;

use crate::error::{Result, StorageError};

pub struct BlobSnapshotStore {
    client: Client,
    bucket: String,
}

/// Connection parameters for the S3-compatible blob store, resolved from environment
/// variables by the caller (overlay-api's configuration layer).
pub struct BlobConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl BlobSnapshotStore {
    pub async fn connect(config: BlobConfig) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "overlay-storage",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_types::region::Region::new(config.region))
            .endpoint_url(config.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;
        let client = Client::new(&sdk_config);
        Self {
            client,
            bucket: config.bucket,
        }
    }

    fn key(id: &str) -> String {
        format!("job-snapshots/{id}.json")
    }

    pub async fn put(&self, id: &str, json: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::key(id))
            .body(ByteStream::from(json.as_bytes().to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::Blob(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::key(id))
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Blob(e.to_string()))?
                    .into_bytes();
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(StorageError::Blob(err.to_string()))
                }
            }
        }
    }

    /// Fire-and-forget write-through, per §4.3: errors are logged and swallowed.
    pub async fn put_best_effort(&self, id: &str, json: &str) {
        if let Err(err) = self.put(id, json).await {
            warn!(job_id = id, error = %err, "blob snapshot write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_under_job_snapshots() {
        assert_eq!(BlobSnapshotStore::key("abc"), "job-snapshots/abc.json");
    }
}
