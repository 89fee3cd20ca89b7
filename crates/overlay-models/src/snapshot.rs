//! The externally visible projection of a job record (see GLOSSARY: Snapshot).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::JobResult;
use crate::job::{JobId, JobMetrics, JobState};

/// JSON body shared by the enqueue response and the status endpoint. The status endpoint
/// additionally populates `result`/`error`/`message`; the enqueue response leaves them `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobState,
    pub progress: u8,
    pub queue_position: u32,
    pub estimated_wait_ms: i64,
    pub estimated_wait_seconds: i64,
    pub average_job_duration_ms: i64,
    pub average_job_duration_seconds: i64,
    pub owner_active_jobs: u32,
    pub owner_job_limit: u32,
    pub metrics: JobMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
