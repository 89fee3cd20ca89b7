//! `probeTemplate`: best-effort ffprobe metadata extraction (§4.1).

use std::path::Path;
use std::process::Stdio;

use overlay_models::TemplateMetadata;
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use crate::command::ffprobe_binary;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
}

const ALPHA_MARKERS: [&str; 5] = ["alpha", "rgba", "bgra", "argb", "yuva"];

/// Substring match on the pixel-format name, per §4.1: `{alpha, rgba, bgra, argb, yuva}`
/// or a trailing `a` (e.g. `ya8`, `gbrap`).
fn pixel_format_has_alpha(pix_fmt: &str) -> bool {
    let lower = pix_fmt.to_ascii_lowercase();
    ALPHA_MARKERS.iter().any(|m| lower.contains(m)) || lower.ends_with('a')
}

/// Probes a template asset for its first video stream's geometry and alpha channel.
/// On any failure, returns the default metadata (`has_alpha_channel = true`) and logs a
/// warning — probing must never block ingestion.
pub async fn probe_template(path: &Path, label: &str) -> TemplateMetadata {
    match try_probe(path).await {
        Ok(meta) => meta,
        Err(err) => {
            warn!(label, path = %path.display(), error = %err, "template probe failed, using defaults");
            TemplateMetadata::default()
        }
    }
}

async fn try_probe(path: &Path) -> Result<TemplateMetadata, String> {
    let binary = ffprobe_binary().ok_or_else(|| "ffprobe not found".to_string())?;

    let output = Command::new(binary)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(format!("ffprobe exited with {:?}", output.status.code()));
    }

    let parsed: FfprobeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| e.to_string())?;

    let video_stream = parsed
        .streams
        .into_iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| "no video stream".to_string())?;

    let has_alpha = video_stream
        .pix_fmt
        .as_deref()
        .map(pixel_format_has_alpha)
        .unwrap_or(true);

    Ok(TemplateMetadata {
        has_alpha_channel: has_alpha,
        width: video_stream.width,
        height: video_stream.height,
        pixel_format: video_stream.pix_fmt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_alpha_pixel_formats() {
        assert!(pixel_format_has_alpha("yuva420p"));
        assert!(pixel_format_has_alpha("rgba"));
        assert!(pixel_format_has_alpha("bgra"));
        assert!(pixel_format_has_alpha("gbrap"));
        assert!(!pixel_format_has_alpha("yuv420p"));
        assert!(!pixel_format_has_alpha("rgb24"));
    }

    #[test]
    fn default_metadata_assumes_alpha_present() {
        let meta = TemplateMetadata::default();
        assert!(meta.has_alpha_channel);
    }
}
