//! `render`: the Render Engine's single public operation (§4.2).

use std::path::{Path, PathBuf};

use overlay_models::{TemplateRef, Variant};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::Result;
use crate::filters::build_filter_graph;

fn basename_no_ext(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string())
}

/// Renders one (source, template, variant) triple into scratch storage, returning the
/// output path: `{scratch_dir}/{variant}_{sourceBasename}_{timestampMs}.mp4`.
pub async fn render(
    runner: &FfmpegRunner,
    scratch_dir: &Path,
    source_path: &Path,
    template: &TemplateRef,
    variant: Variant,
    timestamp_ms: i64,
) -> Result<PathBuf> {
    let graph = build_filter_graph(variant, template.metadata.has_alpha_channel);

    let output_path = scratch_dir.join(format!(
        "{}_{}_{}.mp4",
        variant.as_str(),
        basename_no_ext(source_path),
        timestamp_ms
    ));

    let mut template_input = FfmpegInput::new(&template.scratch_path);
    if template.is_image() {
        template_input = template_input.looped();
    }

    let command = FfmpegCommand::new(&output_path)
        .input(FfmpegInput::new(source_path))
        .input(template_input)
        .filter_complex(graph.filter_complex)
        .map(graph.video_label)
        .map("0:a?".to_string());

    info!(
        variant = %variant,
        source = %source_path.display(),
        template = %template.scratch_path,
        output = %output_path.display(),
        "rendering variant"
    );

    runner.run(&command).await?;

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn basename_strips_extension() {
        assert_eq!(basename_no_ext(&PathBuf::from("/tmp/my_video.mp4")), "my_video");
        assert_eq!(basename_no_ext(&PathBuf::from("/tmp/noext")), "noext");
    }
}
