//! Shared data model for the template-overlay render service.
//!
//! Pure, serde-serializable types for jobs, payloads, variants, and the
//! externally visible snapshot projection. No I/O lives here.

pub mod artifact;
pub mod job;
pub mod payload;
pub mod snapshot;
pub mod variant;

pub use artifact::{JobResult, OutputArtifact};
pub use job::{Job, JobId, JobMetrics, JobState};
pub use payload::{JobPayload, SourceVideoRef, TemplateMetadata, TemplateRef, TemplateSet};
pub use snapshot::JobSnapshot;
pub use variant::Variant;
