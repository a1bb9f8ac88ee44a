//! Core data types and I/O operations.

pub mod align;
pub mod ingest;
pub mod video;

pub use ingest::{EpisodeTable, IngestError};
pub use video::{max_duration, probe_duration, resolve_video_assets, VideoAssetSet};
