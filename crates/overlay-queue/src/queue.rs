//! Queue & Worker (C4) and Supervisor (C5): single-consumer FIFO, worker loop, stuck-job
//! detection and circuit breaker.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use overlay_media::render::render as render_variant;
use overlay_media::FfmpegRunner;
use overlay_models::{Job, JobId, JobSnapshot, OutputArtifact};
use overlay_storage::JobStore;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{QueueError, Result};
use crate::estimate::estimated_wait_ms;
use crate::state::{QueueState, DEFAULT_BREAKER_COOLDOWN_MS, DEFAULT_STALL_THRESHOLD};

/// Default per-owner active-jobs cap (§4.4).
pub const DEFAULT_OWNER_JOB_LIMIT: u32 = 2;

pub struct Queue {
    state: Mutex<QueueState>,
    store: Arc<JobStore>,
    runner: Arc<FfmpegRunner>,
    scratch_dir: PathBuf,
    owner_job_limit: u32,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    pub fn new(store: Arc<JobStore>, runner: Arc<FfmpegRunner>, scratch_dir: PathBuf, owner_job_limit: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::new(DEFAULT_STALL_THRESHOLD, DEFAULT_BREAKER_COOLDOWN_MS)),
            store,
            runner,
            scratch_dir,
            owner_job_limit,
            worker_handle: Mutex::new(None),
        }
    }

    pub fn owner_job_limit(&self) -> u32 {
        self.owner_job_limit
    }

    pub async fn owner_active_jobs(&self, owner: &str) -> u32 {
        self.store.count_active_for_owner(owner).await
    }

    /// Admits `job` if the owner is under the cap, runs the supervisor tick, appends the
    /// job to the pending FIFO, creates its record, and (if the breaker is closed) ensures
    /// a worker is running. Returns the initial snapshot.
    pub async fn enqueue(self: &Arc<Self>, job: Job) -> Result<JobSnapshot> {
        let active = self.owner_active_jobs(&job.owner).await;
        if active >= self.owner_job_limit {
            return Err(QueueError::TooManyActiveJobs {
                owner_active_jobs: active,
                owner_job_limit: self.owner_job_limit,
            });
        }

        self.supervisor_tick().await;

        let id = job.id.clone();
        let owner = job.owner.clone();
        self.store.create(job).await;
        {
            let mut state = self.state.lock().await;
            state.pending.push_back(id.clone());
        }

        self.ensure_worker_started();

        let active_after = self.owner_active_jobs(&owner).await;
        Ok(self.snapshot(&id, active_after).await.expect("just created"))
    }

    /// Builds the public snapshot for a job, computing queue position and estimated wait
    /// from current queue state.
    pub async fn snapshot(&self, id: &JobId, owner_active_jobs: u32) -> Option<JobSnapshot> {
        let job = self.store.get_with_fallback(id).await?;
        let state = self.state.lock().await;
        let queue_position = state.queue_position_ahead(id);
        let avg = state.average_duration_ms();
        drop(state);

        let wait_ms = estimated_wait_ms(job.status, avg, job.elapsed_ms(), queue_position);

        Some(JobSnapshot {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            queue_position,
            estimated_wait_ms: wait_ms,
            estimated_wait_seconds: wait_ms / 1000,
            average_job_duration_ms: avg as i64,
            average_job_duration_seconds: avg as i64 / 1000,
            owner_active_jobs,
            owner_job_limit: self.owner_job_limit,
            metrics: job.metrics,
            result: job.result,
            error: job.error,
            message: None,
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
    }

    pub async fn get_job(&self, id: &JobId) -> Option<Job> {
        self.store.get_with_fallback(id).await
    }

    /// Stuck-job detection and circuit breaker (§4.5). Run opportunistically before every
    /// enqueue, never by an independent timer.
    pub async fn supervisor_tick(&self) {
        self.store.evict_expired(Utc::now()).await;

        let timed_out_job = {
            let mut state = self.state.lock().await;
            let Some(current_id) = state.currently_processing.clone() else {
                return;
            };
            let timeout_ms = state.stall_timeout_ms();
            drop(state);

            let Some(job) = self.store.get(&current_id).await else {
                return;
            };
            if job.elapsed_ms() < timeout_ms as i64 {
                return;
            }
            Some((current_id, timeout_ms, job))
        };

        let Some((id, timeout_ms, job)) = timed_out_job else {
            return;
        };

        warn!(job_id = %id, timeout_ms, "supervisor detected a stalled job");

        let message = format!("job exceeded {} seconds, aborted by supervisor", timeout_ms / 1000);
        self.store.update(&id, |j| j.fail(message)).await;
        cleanup_scratch(&job).await;

        let mut state = self.state.lock().await;
        state.record_stall();
        state.currently_processing = None;
    }

    /// Idempotent: if a worker is already running, this is a no-op (§4.4 "Starting the
    /// worker is idempotent").
    fn ensure_worker_started(self: &Arc<Self>) {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut handle_guard = queue.worker_handle.lock().await;
            if let Some(handle) = handle_guard.as_ref() {
                if !handle.is_finished() {
                    return;
                }
            }

            let breaker_open = {
                let state = queue.state.lock().await;
                state.is_breaker_open()
            };
            if breaker_open {
                info!("circuit breaker open, worker not (re)started");
                return;
            }

            let generation = {
                let state = queue.state.lock().await;
                state.generation
            };

            let worker_queue = queue.clone();
            *handle_guard = Some(tokio::spawn(async move {
                run_worker_loop(worker_queue, generation).await;
            }));
        });
    }
}

async fn cleanup_scratch(job: &Job) {
    let mut paths: Vec<String> = job.payload.sources.iter().map(|s| s.scratch_path.clone()).collect();
    paths.extend(job.payload.templates.iter_present().map(|t| t.scratch_path.clone()));
    overlay_media::fs_utils::delete_scratch_files(paths).await;
}

/// The single-consumer worker loop (§4.4). Runs until the pending FIFO drains or this
/// worker's generation is fenced by the supervisor.
async fn run_worker_loop(queue: Arc<Queue>, generation: u64) {
    loop {
        let current_generation = queue.state.lock().await.generation;
        if current_generation != generation {
            info!(generation, current_generation, "worker generation fenced, stopping");
            return;
        }

        let next_id = {
            let mut state = queue.state.lock().await;
            state.pending.pop_front()
        };
        let Some(id) = next_id else {
            return;
        };

        let Some(job) = queue.store.get(&id).await else {
            continue;
        };

        {
            let mut state = queue.state.lock().await;
            state.currently_processing = Some(id.clone());
        }

        let total_variants = job.payload.total_variants();
        queue.store.update(&id, |j| j.start(total_variants)).await;

        let outcome = process_job(&queue, &id, &job, generation).await;

        // The generation may have been bumped by the supervisor while the last variant
        // was still rendering (process_job only checks between variants). Re-check right
        // before applying a terminal write so a resurrected worker can never overwrite a
        // terminal state the supervisor already set (§3, §4.4). `Job::complete`/`Job::fail`
        // are also no-ops on an already-terminal job, as a second line of defense.
        let still_current = queue.state.lock().await.generation == generation;

        match outcome {
            JobOutcome::Completed(result) => {
                if !still_current {
                    info!(job_id = %id, "worker fenced after finishing render, discarding stale completion");
                    return;
                }
                queue.store.update(&id, |j| j.complete(result)).await;
                if let Some(completed) = queue.store.get(&id).await {
                    if let Some(duration) = completed.duration_ms() {
                        let mut state = queue.state.lock().await;
                        state.record_success(duration as u64);
                    }
                }
                cleanup_scratch(&job).await;
                let mut state = queue.state.lock().await;
                state.currently_processing = None;
            }
            JobOutcome::Failed(err) => {
                if !still_current {
                    info!(job_id = %id, error = %err, "worker fenced after a failed render, discarding stale failure");
                    return;
                }
                error!(job_id = %id, error = %err, "render failed");
                queue.store.update(&id, |j| j.fail(err.to_string())).await;
                cleanup_scratch(&job).await;
                let mut state = queue.state.lock().await;
                state.currently_processing = None;
            }
            JobOutcome::Fenced => {
                info!(job_id = %id, "worker fenced mid-job, leaving supervisor's terminal state untouched");
                return;
            }
        }
    }
}

enum JobOutcome {
    Completed(Vec<OutputArtifact>),
    Failed(overlay_media::MediaError),
    Fenced,
}

async fn process_job(queue: &Arc<Queue>, id: &JobId, job: &Job, generation: u64) -> JobOutcome {
    let mut results = Vec::new();

    for source in &job.payload.sources {
        for template in job.payload.templates.iter_present() {
            let current_generation = queue.state.lock().await.generation;
            if current_generation != generation {
                return JobOutcome::Fenced;
            }

            let timestamp_ms = Utc::now().timestamp_millis();
            let output = render_variant(
                &queue.runner,
                &queue.scratch_dir,
                std::path::Path::new(&source.scratch_path),
                template,
                template.variant,
                timestamp_ms,
            )
            .await;

            match output {
                Ok(path) => {
                    let filename = path
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    results.push(OutputArtifact::new(template.variant, filename));
                    queue.store.update(id, |j| j.record_variant_completed()).await;
                }
                Err(err) => return JobOutcome::Failed(err),
            }
        }
    }

    JobOutcome::Completed(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_models::payload::{JobPayload, SourceVideoRef, TemplateRef, TemplateSet};
    use overlay_models::Variant;
    use overlay_storage::JobStore;

    fn sample_payload() -> JobPayload {
        JobPayload {
            sources: vec![SourceVideoRef {
                scratch_path: "/tmp/s.mp4".into(),
                original_name: "s.mp4".into(),
            }],
            templates: TemplateSet {
                vertical: Some(TemplateRef::new("/tmp/t.png".into(), "t.png".into(), Variant::Vertical)),
                square: None,
                landscape: None,
            },
        }
    }

    fn test_queue() -> Arc<Queue> {
        let store = Arc::new(JobStore::new(None, None, 86400));
        // FfmpegRunner::new() resolves a real binary path lazily only at `run()` time in
        // tests that never call it; these admission-only tests never render.
        let runner = Arc::new(FfmpegRunner::with_binary("ffmpeg"));
        Arc::new(Queue::new(store, runner, PathBuf::from("/tmp"), DEFAULT_OWNER_JOB_LIMIT))
    }

    #[tokio::test]
    async fn enqueue_rejects_once_owner_cap_is_reached() {
        let queue = test_queue();
        let owner = "anon_same";

        for _ in 0..DEFAULT_OWNER_JOB_LIMIT {
            let job = Job::new(owner, sample_payload());
            assert!(queue.enqueue(job).await.is_ok());
        }

        let job = Job::new(owner, sample_payload());
        let err = queue.enqueue(job).await.unwrap_err();
        match err {
            QueueError::TooManyActiveJobs {
                owner_active_jobs,
                owner_job_limit,
            } => {
                assert_eq!(owner_active_jobs, DEFAULT_OWNER_JOB_LIMIT);
                assert_eq!(owner_job_limit, DEFAULT_OWNER_JOB_LIMIT);
            }
            other => panic!("expected TooManyActiveJobs, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn different_owners_do_not_share_the_cap() {
        let queue = test_queue();
        for owner in ["anon_a", "anon_b", "anon_c"] {
            let job = Job::new(owner, sample_payload());
            assert!(queue.enqueue(job).await.is_ok());
        }
    }
}
