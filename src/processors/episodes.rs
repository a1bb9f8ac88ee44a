//! Episode assembly: drives ingestion, video resolution, alignment, and
//! point cloud sampling for every input file.
//!
//! Any stage failure for one file is logged and the file is skipped; the
//! batch as a whole never aborts on a single bad log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{error, info};
use serde::Serialize;

use crate::config::{PipelineConfig, SamplingOptions};
use crate::core::{align, ingest, video};
use crate::processors::sampler;

/// One input file reference: the on-disk path plus the upload's original
/// display name (used in log lines only).
#[derive(Debug, Clone)]
pub struct FileRef {
    pub path: PathBuf,
    pub original_name: String,
}

impl FileRef {
    /// Parse a `path:original_name` reference.
    ///
    /// Splits on the last `:` so drive-letter paths survive; if the part
    /// after the colon looks like a path itself, or there is no colon, the
    /// whole string is the path and the file stem becomes the display name.
    pub fn parse(reference: &str) -> Self {
        if let Some((path, name)) = reference.rsplit_once(':') {
            if !path.is_empty() && !name.is_empty() && !name.contains('/') && !name.contains('\\') {
                return Self {
                    path: PathBuf::from(path),
                    original_name: name.to_string(),
                };
            }
        }

        let path = PathBuf::from(reference);
        let original_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| reference.to_string());
        Self { path, original_name }
    }
}

/// Motor trajectory of one episode: normalized timestamps and the action
/// vector of each retained frame.
#[derive(Debug, Clone, Serialize)]
pub struct MotorData {
    pub time: Vec<f64>,
    pub motors: Vec<Vec<f64>>,
}

/// One viewer-ready episode record.
///
/// Invariant: `time`, `motors`, and every camera's sample list all have
/// exactly `frame_count` entries.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub key: String,
    pub index: i64,
    #[serde(rename = "folderPath")]
    pub folder_path: String,
    pub frame_count: usize,
    pub video_paths: BTreeMap<String, Option<String>>,
    pub motor_data: MotorData,
    pub pointcloud_data: BTreeMap<String, Vec<Vec<[f32; 3]>>>,
}

/// Transform one episode log into a record.
fn process_file(
    file: &FileRef,
    folder: &Path,
    config: &PipelineConfig,
    options: &SamplingOptions,
    pool: &rayon::ThreadPool,
) -> Result<EpisodeRecord> {
    let table = ingest::load_episode_log(&file.path, &config.cameras.pointcloud_cameras)
        .with_context(|| format!("reading {}", file.path.display()))?;

    let assets = video::resolve_video_assets(
        folder,
        &table.key,
        &config.cameras.video_cameras,
        &config.cameras.video_extensions,
    );
    let video_duration = video::max_duration(&assets);
    info!("max video duration for {}: {}s", table.key, video_duration);

    let budget = align::frame_budget(table.num_rows, options.frame_cap());
    let indices = align::stride_indices(table.num_rows, budget);
    if indices.is_empty() {
        bail!("no rows left after downsampling {}", file.path.display());
    }
    let retained = indices.len();
    info!(
        "{}: retaining {} of {} rows (budget {})",
        table.key, retained, table.num_rows, budget
    );

    let motors = align::take_rows(&table.actions, &indices);
    if motors.is_empty() || motors.iter().all(|m| m.is_empty()) {
        bail!("empty action data in {}", file.path.display());
    }

    let raw_timestamps = table
        .timestamps
        .as_ref()
        .map(|ts| align::take_rows(ts, &indices));
    let time = align::normalize_timestamps(raw_timestamps.as_deref(), retained, video_duration);

    let point_cap = match (options.max_points, options.quality) {
        (Some(cap), _) => Some(cap),
        (None, Some(preset)) => preset.max_points(),
        (None, None) => Some(sampler::adaptive_point_cap(retained)),
    };

    let mut pointcloud_data = BTreeMap::new();
    for camera in &config.cameras.pointcloud_cameras {
        let buffers = table
            .pointclouds
            .get(camera)
            .map(|rows| align::take_rows(rows, &indices))
            .unwrap_or_else(|| vec![Vec::new(); retained]);
        let samples = sampler::sample_frames(&buffers, point_cap, pool);
        info!(
            "{}: sampled {} frames for {} (cap {:?})",
            table.key,
            samples.len(),
            camera,
            point_cap
        );
        pointcloud_data.insert(camera.clone(), samples);
    }

    let video_paths = assets
        .paths
        .into_iter()
        .map(|(camera, path)| (camera, path.map(|p| p.display().to_string())))
        .collect();

    Ok(EpisodeRecord {
        key: table.key,
        index: table.index,
        folder_path: folder.display().to_string().replace('\\', "/"),
        frame_count: retained,
        video_paths,
        motor_data: MotorData { time, motors },
        pointcloud_data,
    })
}

/// Run the pipeline over every input file, in order.
///
/// Per-file failures are logged and skipped; the returned records preserve
/// input order.
pub fn parse_episodes(
    files: &[FileRef],
    folder: &Path,
    config: &PipelineConfig,
    options: &SamplingOptions,
) -> Result<Vec<EpisodeRecord>> {
    let pool = sampler::sampler_pool(config.sampling.sampler_threads)
        .context("building sampler worker pool")?;

    info!("parsing {} files, folder: {}", files.len(), folder.display());

    let mut episodes = Vec::with_capacity(files.len());
    for file in files {
        info!(
            "processing {} (original name: {})",
            file.path.display(),
            file.original_name
        );
        match process_file(file, folder, config, options, &pool) {
            Ok(record) => {
                info!("generated episode {}", record.key);
                episodes.push(record);
            }
            Err(e) => {
                error!("skipping {}: {:#}", file.path.display(), e);
            }
        }
    }

    info!("parsing complete, {} episodes generated", episodes.len());
    Ok(episodes)
}
