//! LeRobot episode log processing pipeline.
//!
//! This crate provides tools for:
//! - Loading robot teleoperation episode logs from parquet files
//! - Resolving and probing per-camera video assets
//! - Stride-based frame downsampling and timestamp normalization
//! - Random per-frame point cloud subsampling (parallelized)
//! - Assembling size-governed JSON payloads for the episode viewer
//!
//! # Example
//!
//! ```no_run
//! use lerobot_pipeline::config::{PipelineConfig, SamplingOptions};
//! use lerobot_pipeline::processors::{parse_episodes, FileRef};
//!
//! let config = PipelineConfig::default();
//! let files = vec![FileRef::parse("/data/episode_000001.parquet")];
//! let episodes = parse_episodes(&files, "/data/session".as_ref(), &config, &SamplingOptions::default()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{CameraConfig, PipelineConfig, QualityPreset, SamplingOptions, SizeConfig};
pub use crate::core::ingest::EpisodeTable;
pub use processors::{EpisodeRecord, FileRef};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
