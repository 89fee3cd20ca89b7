//! Job Store (C3): in-memory authoritative table plus KV/blob write-through caches.

pub mod blob;
pub mod error;
pub mod job_store;
pub mod kv;

pub use blob::{BlobConfig, BlobSnapshotStore};
pub use error::{Result, StorageError};
pub use job_store::JobStore;
pub use kv::RedisSnapshotCache;
