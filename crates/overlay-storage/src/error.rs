//! Storage-layer errors. Per §4.3, secondary-store (KV/blob) failures are fire-and-forget:
//! they are logged by the caller and never propagated past the job store's public API.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("kv cache error: {0}")]
    Kv(String),

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
