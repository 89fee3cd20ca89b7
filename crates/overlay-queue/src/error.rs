//! Queue/admission errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("owner has reached the active-jobs cap ({owner_active_jobs}/{owner_job_limit})")]
    TooManyActiveJobs {
        owner_active_jobs: u32,
        owner_job_limit: u32,
    },

    #[error("job not found")]
    NotFound,
}
