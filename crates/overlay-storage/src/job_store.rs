//! Job Store (C3): authoritative in-memory table, write-through to KV and blob caches.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use overlay_models::{Job, JobId};
use tokio::sync::RwLock;
use tracing::warn;

use crate::blob::BlobSnapshotStore;
use crate::kv::RedisSnapshotCache;

/// Authoritative job table. The single worker is the only mutator of job fields; the HTTP
/// surface only reads. `update()` takes the whole record under the write lock so that
/// readers never observe a torn `{status, progress, result}` triple (§4.3 atomicity
/// contract).
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    kv: Option<Arc<RedisSnapshotCache>>,
    blob: Option<Arc<BlobSnapshotStore>>,
    snapshot_ttl_seconds: u64,
}

impl JobStore {
    pub fn new(
        kv: Option<Arc<RedisSnapshotCache>>,
        blob: Option<Arc<BlobSnapshotStore>>,
        snapshot_ttl_seconds: u64,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            kv,
            blob,
            snapshot_ttl_seconds,
        }
    }

    pub async fn create(&self, job: Job) {
        let id = job.id.clone();
        self.jobs.write().await.insert(id, job.clone());
        self.write_through(&job);
    }

    /// In-memory first; callers needing the cross-instance fallback (memory -> KV -> blob)
    /// should use `get_with_fallback`, which is what the HTTP status handler calls.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Read order per §4.3: in-memory first, then KV, then blob, returning the first hit.
    /// KV/blob hits are deserialized as a plain JSON value since cross-instance snapshots
    /// may be partial (no full `Job` round-trip is guaranteed); callers treat a fallback
    /// hit as informational only, matching §5's crash-safety contract.
    pub async fn get_with_fallback(&self, id: &JobId) -> Option<Job> {
        if let Some(job) = self.get(id).await {
            return Some(job);
        }

        if let Some(kv) = &self.kv {
            match kv.get(id.as_str()).await {
                Ok(Some(json)) => {
                    if let Ok(job) = serde_json::from_str::<Job>(&json) {
                        return Some(job);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(job_id = %id, error = %err, "kv fallback read failed"),
            }
        }

        if let Some(blob) = &self.blob {
            match blob.get(id.as_str()).await {
                Ok(Some(json)) => {
                    if let Ok(job) = serde_json::from_str::<Job>(&json) {
                        return Some(job);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(job_id = %id, error = %err, "blob fallback read failed"),
            }
        }

        None
    }

    /// Applies `mutator` to the job under the write lock and write-throughs the result.
    /// Returns `false` if the ID no longer resolves (the worker's "skip if ID no longer
    /// resolves" case from §4.4).
    pub async fn update(&self, id: &JobId, mutator: impl FnOnce(&mut Job)) -> bool {
        let updated = {
            let mut guard = self.jobs.write().await;
            match guard.get_mut(id) {
                Some(job) => {
                    mutator(job);
                    Some(job.clone())
                }
                None => None,
            }
        };

        match updated {
            Some(job) => {
                self.write_through(&job);
                true
            }
            None => false,
        }
    }

    pub async fn delete(&self, id: &JobId) {
        self.jobs.write().await.remove(id);
    }

    /// Best-effort eviction of terminal jobs older than the snapshot TTL (SPEC_FULL.md's
    /// resolution of the "no eviction policy" open question), run opportunistically by the
    /// supervisor tick rather than an independent timer.
    pub async fn evict_expired(&self, now: DateTime<Utc>) {
        let ttl = chrono::Duration::seconds(self.snapshot_ttl_seconds as i64);
        self.jobs.write().await.retain(|_, job| match job.finished_at {
            Some(finished_at) => now - finished_at < ttl,
            None => true,
        });
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Count of jobs for `owner` in `{pending, processing}`, used by the per-owner
    /// fairness cap (§4.4).
    pub async fn count_active_for_owner(&self, owner: &str) -> u32 {
        use overlay_models::JobState;
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| {
                job.owner == owner && matches!(job.status, JobState::Pending | JobState::Processing)
            })
            .count() as u32
    }

    fn write_through(&self, job: &Job) {
        let Ok(json) = serde_json::to_string(job) else {
            warn!(job_id = %job.id, "failed to serialize job snapshot for write-through");
            return;
        };

        if let Some(kv) = self.kv.clone() {
            let id = job.id.as_str().to_string();
            let ttl = self.snapshot_ttl_seconds;
            let json = json.clone();
            tokio::spawn(async move {
                kv.put_best_effort(&id, &json, ttl).await;
            });
        }

        if let Some(blob) = self.blob.clone() {
            let id = job.id.as_str().to_string();
            tokio::spawn(async move {
                blob.put_best_effort(&id, &json).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_models::payload::{JobPayload, SourceVideoRef, TemplateRef, TemplateSet};
    use overlay_models::Variant;

    fn sample_job() -> Job {
        Job::new(
            "anon_abc",
            JobPayload {
                sources: vec![SourceVideoRef {
                    scratch_path: "/tmp/a.mp4".into(),
                    original_name: "a.mp4".into(),
                }],
                templates: TemplateSet {
                    vertical: Some(TemplateRef::new("/tmp/t.png".into(), "t.png".into(), Variant::Vertical)),
                    square: None,
                    landscape: None,
                },
            },
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = JobStore::new(None, None, 86400);
        let job = sample_job();
        let id = job.id.clone();
        store.create(job).await;

        let fetched = store.get(&id).await.expect("job present");
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn update_on_unknown_id_returns_false() {
        let store = JobStore::new(None, None, 86400);
        let unknown = JobId::new();
        let applied = store.update(&unknown, |job| job.progress = 50).await;
        assert!(!applied);
    }

    #[tokio::test]
    async fn update_mutates_atomically_visible_job() {
        let store = JobStore::new(None, None, 86400);
        let job = sample_job();
        let id = job.id.clone();
        store.create(job).await;

        store.update(&id, |job| job.start(1)).await;
        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.progress, 5);
    }

    #[tokio::test]
    async fn evict_expired_removes_old_terminal_jobs_only() {
        let store = JobStore::new(None, None, 60);
        let mut job = sample_job();
        job.start(1);
        job.complete(vec![]);
        job.finished_at = Some(Utc::now() - chrono::Duration::seconds(120));
        let id = job.id.clone();
        store.create(job).await;

        store.evict_expired(Utc::now()).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn count_active_for_owner_ignores_terminal_jobs() {
        let store = JobStore::new(None, None, 86400);
        let mut active = sample_job();
        active.owner = "anon_x".into();
        let mut done = sample_job();
        done.owner = "anon_x".into();
        done.start(1);
        done.complete(vec![]);
        store.create(active).await;
        store.create(done).await;

        assert_eq!(store.count_active_for_owner("anon_x").await, 1);
        assert_eq!(store.count_active_for_owner("anon_y").await, 0);
    }

    #[tokio::test]
    async fn evict_expired_keeps_active_jobs() {
        let store = JobStore::new(None, None, 60);
        let job = sample_job();
        let id = job.id.clone();
        store.create(job).await;

        store.evict_expired(Utc::now()).await;
        assert!(store.get(&id).await.is_some());
    }
}
