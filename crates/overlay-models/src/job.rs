//! Job identity and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::{JobResult, OutputArtifact};
use crate::payload::JobPayload;

/// Opaque job identifier, freshly generated per enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status. Terminal states (`Completed`, `Failed`) are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-variant completion counters, `completedVariants <= totalVariants` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobMetrics {
    pub completed_variants: u32,
    pub total_variants: u32,
}

/// Authoritative job record. Mutated only by the worker, except `updated_at` bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: String,
    pub status: JobState,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<JobResult>,
    pub metrics: JobMetrics,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(owner: impl Into<String>, payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner: owner.into(),
            status: JobState::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            error: None,
            result: None,
            metrics: JobMetrics::default(),
            payload,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self, total_variants: u32) {
        self.status = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.progress = 5;
        self.metrics.total_variants = total_variants;
        self.touch();
    }

    pub fn record_variant_completed(&mut self) {
        self.metrics.completed_variants += 1;
        let pct = if self.metrics.total_variants == 0 {
            99
        } else {
            ((self.metrics.completed_variants as f64 / self.metrics.total_variants as f64) * 100.0).round() as u32
        };
        self.progress = pct.min(99) as u8;
        self.touch();
    }

    /// No-op if the job is already in a terminal state: terminal states are sticky
    /// (§3), so a resurrected worker racing a supervisor-set `failed` must never
    /// overwrite it with `completed`.
    pub fn complete(&mut self, result: Vec<OutputArtifact>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobState::Completed;
        self.progress = 100;
        self.result = Some(JobResult::new(result));
        self.finished_at = Some(Utc::now());
        self.touch();
    }

    /// No-op if the job is already in a terminal state, for the same reason as `complete`.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobState::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        self.touch();
    }

    pub fn elapsed_ms(&self) -> i64 {
        match self.started_at {
            Some(started) => (Utc::now() - started).num_milliseconds().max(0),
            None => 0,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(s), Some(f)) => Some((f - s).num_milliseconds().max(0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{JobPayload, SourceVideoRef, TemplateRef, TemplateSet};
    use crate::variant::Variant;

    fn sample_payload() -> JobPayload {
        JobPayload {
            sources: vec![SourceVideoRef {
                scratch_path: "/tmp/a.mp4".into(),
                original_name: "a.mp4".into(),
            }],
            templates: TemplateSet {
                vertical: Some(TemplateRef::new(
                    "/tmp/t.png".into(),
                    "t.png".into(),
                    Variant::Vertical,
                )),
                square: None,
                landscape: None,
            },
        }
    }

    #[test]
    fn new_job_is_pending_with_zero_progress() {
        let job = Job::new("anon_abc", sample_payload());
        assert_eq!(job.status, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn start_seeds_progress_at_five() {
        let mut job = Job::new("anon_abc", sample_payload());
        job.start(1);
        assert_eq!(job.status, JobState::Processing);
        assert_eq!(job.progress, 5);
        assert_eq!(job.metrics.total_variants, 1);
    }

    #[test]
    fn progress_caps_at_ninety_nine_until_complete() {
        let mut job = Job::new("anon_abc", sample_payload());
        job.start(2);
        job.record_variant_completed();
        assert_eq!(job.progress, 50);
        job.record_variant_completed();
        // Even at 2/2 (100%), progress is clamped below completion until `complete()` is called.
        assert_eq!(job.progress, 99);
        job.complete(vec![]);
        assert_eq!(job.progress, 100);
        assert_eq!(job.status, JobState::Completed);
    }

    #[test]
    fn fail_sets_terminal_state_and_error() {
        let mut job = Job::new("anon_abc", sample_payload());
        job.start(1);
        job.fail("boom");
        assert_eq!(job.status, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.finished_at.is_some());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn complete_is_a_no_op_once_already_failed() {
        let mut job = Job::new("anon_abc", sample_payload());
        job.start(1);
        job.fail("supervisor timeout");
        job.complete(vec![]);
        assert_eq!(job.status, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("supervisor timeout"));
        assert!(job.result.is_none());
    }

    #[test]
    fn fail_is_a_no_op_once_already_completed() {
        let mut job = Job::new("anon_abc", sample_payload());
        job.start(1);
        job.complete(vec![]);
        job.fail("too late");
        assert_eq!(job.status, JobState::Completed);
        assert!(job.error.is_none());
    }
}
