//! KV snapshot cache (Redis), write-through only. Presence of `REDIS_URL` toggles this on.

use redis::AsyncCommands;
use tracing::warn;

use crate::error::{Result, StorageError};

pub struct RedisSnapshotCache {
    client: redis::Client,
}

impl RedisSnapshotCache {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| StorageError::Kv(e.to_string()))?;
        Ok(Self { client })
    }

    fn key(id: &str) -> String {
        format!("video-job:{id}")
    }

    pub async fn put(&self, id: &str, json: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Kv(e.to_string()))?;
        conn.set_ex::<_, _, ()>(Self::key(id), json, ttl_seconds)
            .await
            .map_err(|e| StorageError::Kv(e.to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Kv(e.to_string()))?;
        conn.get(Self::key(id)).await.map_err(|e| StorageError::Kv(e.to_string()))
    }

    /// Fire-and-forget write-through, per §4.3: errors are logged and swallowed.
    pub async fn put_best_effort(&self, id: &str, json: &str, ttl_seconds: u64) {
        if let Err(err) = self.put(id, json, ttl_seconds).await {
            warn!(job_id = id, error = %err, "kv snapshot write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced() {
        assert_eq!(RedisSnapshotCache::key("abc"), "video-job:abc");
    }
}
