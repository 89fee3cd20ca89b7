//! Typed ffmpeg command specification and subprocess runner.
//!
//! The media-processing binary is treated as an opaque subprocess (§1): we never shell out
//! to a string, we build a typed argv and execute it with stdout/stderr captured.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use which::which;

use crate::error::{MediaError, Result};

/// A single ffmpeg input, with its own pre-input args (e.g. `-stream_loop -1` for looped
/// image templates).
#[derive(Debug, Clone)]
pub struct FfmpegInput {
    pub path: PathBuf,
    pub pre_args: Vec<String>,
}

impl FfmpegInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pre_args: Vec::new(),
        }
    }

    /// Loop this input indefinitely (used for still-image templates composited against a
    /// moving source, per §4.2's "image templates additionally looped infinitely").
    pub fn looped(mut self) -> Self {
        self.pre_args.push("-stream_loop".into());
        self.pre_args.push("-1".into());
        self
    }
}

/// Builder for a single ffmpeg invocation: N inputs, one filter_complex, explicit output maps.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    filter_complex: Option<String>,
    maps: Vec<String>,
    video_codec: String,
    preset: String,
    crf: u32,
    pixel_format: String,
    audio_codec: String,
    audio_bitrate: String,
    shortest: bool,
    faststart: bool,
    output: PathBuf,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            inputs: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            video_codec: "libx264".into(),
            preset: "slow".into(),
            crf: 18,
            pixel_format: "yuv420p".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            shortest: true,
            faststart: true,
            output: output.into(),
            overwrite: true,
            log_level: "error".into(),
        }
    }

    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn filter_complex(mut self, graph: impl Into<String>) -> Self {
        self.filter_complex = Some(graph.into());
        self
    }

    pub fn map(mut self, label: impl Into<String>) -> Self {
        self.maps.push(label.into());
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".into());
        }
        args.push("-v".into());
        args.push(self.log_level.clone());
        args.push("-progress".into());
        args.push("pipe:2".into());

        for input in &self.inputs {
            args.extend(input.pre_args.clone());
            args.push("-i".into());
            args.push(input.path.to_string_lossy().into_owned());
        }

        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".into());
            args.push(graph.clone());
        }

        for label in &self.maps {
            args.push("-map".into());
            args.push(label.clone());
        }

        args.push("-c:v".into());
        args.push(self.video_codec.clone());
        args.push("-preset".into());
        args.push(self.preset.clone());
        args.push("-crf".into());
        args.push(self.crf.to_string());
        args.push("-pix_fmt".into());
        args.push(self.pixel_format.clone());
        args.push("-c:a".into());
        args.push(self.audio_codec.clone());
        args.push("-b:a".into());
        args.push(self.audio_bitrate.clone());

        if self.shortest {
            args.push("-shortest".into());
        }
        if self.faststart {
            args.push("-movflags".into());
            args.push("+faststart".into());
        }

        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Progress sample parsed from ffmpeg's `-progress pipe:2` key=value stream.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    pub out_time_ms: Option<u64>,
    pub frame: Option<u64>,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub done: bool,
}

fn parse_progress_line(acc: &mut FfmpegProgress, line: &str) {
    let Some((key, value)) = line.split_once('=') else {
        return;
    };
    let value = value.trim();
    match key {
        "out_time_ms" | "out_time_us" => acc.out_time_ms = value.parse().ok(),
        "frame" => acc.frame = value.parse().ok(),
        "fps" => acc.fps = value.parse().ok(),
        "speed" => acc.speed = value.trim_end_matches('x').parse().ok(),
        "progress" => acc.done = value == "end",
        _ => {}
    }
}

/// Runs `FfmpegCommand`s against the `ffmpeg` binary resolved from PATH (or `FFMPEG_PATH`).
pub struct FfmpegRunner {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Result<Self> {
        let binary = resolve_binary("ffmpeg", "FFMPEG_PATH").ok_or(MediaError::MissingFfmpeg)?;
        Ok(Self {
            binary,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Constructs a runner against an explicit binary path without probing PATH, useful for
    /// tests that exercise queue/admission logic without a real ffmpeg installation.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    pub async fn run(&self, command: &FfmpegCommand) -> Result<()> {
        self.run_with_progress(command, |_| {}).await
    }

    pub async fn run_with_progress<F>(&self, command: &FfmpegCommand, mut on_progress: F) -> Result<()>
    where
        F: FnMut(FfmpegProgress) + Send,
    {
        let args = command.build_args();
        debug!(args = ?args, "spawning ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().expect("stderr piped");
        let mut lines = BufReader::new(stderr).lines();
        let mut stderr_buffer = String::new();
        let mut acc = FfmpegProgress::default();

        let wait_fut = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        stderr_buffer.push_str(&line);
                        stderr_buffer.push('\n');
                        parse_progress_line(&mut acc, &line);
                        if acc.done {
                            on_progress(std::mem::take(&mut acc));
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            child.wait().await
        };

        let status = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wait_fut).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.start_kill();
                    return Err(MediaError::pipeline_failed(
                        "ffmpeg timed out and was killed",
                        None,
                    ));
                }
            },
            None => wait_fut.await?,
        };

        if !status.success() {
            warn!(code = ?status.code(), "ffmpeg exited non-zero");
            return Err(MediaError::pipeline_failed(&stderr_buffer, status.code()));
        }

        Ok(())
    }
}

fn resolve_binary(name: &str, env_override: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_override) {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    which(name).ok()
}

/// Raised once at startup if the media tool is absent (§4.2 `MissingBinary`).
pub fn check_ffmpeg_present() -> Result<()> {
    resolve_binary("ffmpeg", "FFMPEG_PATH")
        .map(|_| ())
        .ok_or(MediaError::MissingFfmpeg)
}

pub fn check_ffprobe_present() -> Result<()> {
    resolve_binary("ffprobe", "FFPROBE_PATH")
        .map(|_| ())
        .ok_or(MediaError::MissingFfprobe)
}

pub fn ffprobe_binary() -> Option<PathBuf> {
    resolve_binary("ffprobe", "FFPROBE_PATH")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_includes_progress_pipe_and_inputs() {
        let cmd = FfmpegCommand::new("/tmp/out.mp4")
            .input(FfmpegInput::new("/tmp/source.mp4"))
            .input(FfmpegInput::new("/tmp/template.png").looped())
            .filter_complex("[0:v]scale=1080:1920[vout]")
            .map("[vout]".to_string())
            .map("0:a?".to_string());

        let args = cmd.build_args();
        assert!(args.contains(&"-progress".to_string()));
        assert!(args.contains(&"pipe:2".to_string()));
        assert!(args.contains(&"-stream_loop".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
        assert!(args.iter().any(|a| a == "-filter_complex"));
    }

    #[test]
    fn parses_progress_key_values() {
        let mut acc = FfmpegProgress::default();
        parse_progress_line(&mut acc, "frame=120");
        parse_progress_line(&mut acc, "fps=29.97");
        parse_progress_line(&mut acc, "out_time_ms=4000000");
        parse_progress_line(&mut acc, "progress=continue");
        assert_eq!(acc.frame, Some(120));
        assert_eq!(acc.out_time_ms, Some(4_000_000));
        assert!(!acc.done);
        parse_progress_line(&mut acc, "progress=end");
        assert!(acc.done);
    }
}
