//! Queue & Worker (C4) and Supervisor (C5).

pub mod error;
pub mod estimate;
pub mod queue;
pub mod state;

pub use error::{QueueError, Result};
pub use queue::{Queue, DEFAULT_OWNER_JOB_LIMIT};
