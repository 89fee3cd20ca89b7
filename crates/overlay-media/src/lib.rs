//! Media layer: remote-asset ingestion, metadata probing, and the ffmpeg-backed render
//! engine (components C1 and C2 of the service contract).

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod ingest;
pub mod probe;
pub mod render;

pub use command::{check_ffmpeg_present, check_ffprobe_present, FfmpegRunner};
pub use error::{MediaError, Result};
pub use ingest::{ingest, LocalAsset, RemoteRef, MAX_DECLARED_SIZE_BYTES};
pub use probe::probe_template;
pub use render::render;
