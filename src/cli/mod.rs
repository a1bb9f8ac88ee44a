//! Command-line interface for the episode pipeline.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{QualityPreset, SamplingOptions};
use crate::processors::{episodes, size_guard};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "lerobot-pipeline")]
#[command(about = "LeRobot episode log to viewer JSON pipeline", version)]
pub struct Cli {
    /// Episode log files, each as `path` or `path:original_name`
    #[arg(short, long, num_args = 1.., required = true)]
    files: Vec<String>,

    /// Session folder containing per-camera video subdirectories
    #[arg(long)]
    folder_path: PathBuf,

    /// Quality preset: low, medium, high, or full
    #[arg(short, long)]
    quality: Option<QualityPreset>,

    /// Maximum frames to retain per episode (overrides the preset)
    #[arg(long)]
    max_frames: Option<usize>,

    /// Maximum points per point cloud frame (overrides the preset)
    #[arg(long)]
    max_points: Option<usize>,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Parse arguments, run the batch, and print the JSON payload to stdout.
///
/// Stdout carries exactly one JSON document; all diagnostics go to stderr.
/// The exit code is non-zero only when no payload could be produced.
pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let options = SamplingOptions {
        quality: cli.quality,
        max_frames: cli.max_frames,
        max_points: cli.max_points,
    };

    let start = Instant::now();
    let files: Vec<episodes::FileRef> = cli.files.iter().map(|f| episodes::FileRef::parse(f)).collect();

    let spinner = create_spinner("Parsing episode logs...");

    let result = episodes::parse_episodes(&files, &cli.folder_path, &config, &options);

    spinner.finish_and_clear();

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            println!("{}", size_guard::error_object(&format!("{:#}", e)));
            std::process::exit(1);
        }
    };

    info!(
        "processed {} of {} files in {:.2?}",
        records.len(),
        files.len(),
        start.elapsed()
    );

    let payload = size_guard::finalize_payload(records, options.is_full(), &config.size);
    println!("{}", payload.into_json());
}
