//! Render outputs.

use serde::{Deserialize, Serialize};

use crate::variant::Variant;

/// One completed render. `filename` is a basename only; `url` is derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub variant: Variant,
    pub filename: String,
    pub url: String,
}

impl OutputArtifact {
    pub fn new(variant: Variant, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let url = format!("/output/{filename}");
        Self {
            variant,
            filename,
            url,
        }
    }
}

/// A job's completed output, as exposed to the web client: a `videos` array, one entry
/// per rendered variant, in the order the variants completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub videos: Vec<OutputArtifact>,
}

impl JobResult {
    pub fn new(videos: Vec<OutputArtifact>) -> Self {
        Self { videos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_derived_from_filename() {
        let artifact = OutputArtifact::new(Variant::Square, "square_source_123.mp4");
        assert_eq!(artifact.url, "/output/square_source_123.mp4");
    }

    #[test]
    fn job_result_wraps_artifacts_under_videos() {
        let result = JobResult::new(vec![OutputArtifact::new(Variant::Vertical, "v.mp4")]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["videos"][0]["filename"], "v.mp4");
    }
}
