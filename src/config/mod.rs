//! Configuration types for the episode pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Output fidelity preset controlling frame and point budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    /// No caps: keep the source frame and point counts.
    Full,
}

impl QualityPreset {
    /// Maximum retained frames for this preset, `None` for uncapped.
    pub fn max_frames(self) -> Option<usize> {
        match self {
            Self::Low => Some(300),
            Self::Medium => Some(800),
            Self::High => Some(1500),
            Self::Full => None,
        }
    }

    /// Maximum points per frame for this preset, `None` for uncapped.
    pub fn max_points(self) -> Option<usize> {
        match self {
            Self::Low => Some(300),
            Self::Medium => Some(600),
            Self::High => Some(1000),
            Self::Full => None,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown quality preset '{}' (expected low|medium|high|full)",
                other
            )),
        }
    }
}

/// Caller-supplied sampling overrides. Explicit caps win over the preset;
/// with neither, the adaptive fallback policies apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingOptions {
    pub quality: Option<QualityPreset>,
    pub max_frames: Option<usize>,
    pub max_points: Option<usize>,
}

impl SamplingOptions {
    /// Effective frame cap, `None` meaning "fall back to the auto policy".
    pub fn frame_cap(&self) -> Option<usize> {
        self.max_frames
            .or_else(|| self.quality.and_then(|q| q.max_frames()))
    }

    /// Whether the options pin the output to uncapped `full` fidelity.
    pub fn is_full(&self) -> bool {
        self.quality == Some(QualityPreset::Full)
    }
}

/// Camera layout of the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Cameras with video assets on disk.
    #[serde(default = "default_video_cameras")]
    pub video_cameras: Vec<String>,

    /// Cameras with per-row point cloud columns in the log.
    #[serde(default = "default_pointcloud_cameras")]
    pub pointcloud_cameras: Vec<String>,

    /// Video file extensions, tried in order.
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_video_cameras() -> Vec<String> {
    vec![
        "cam_top".to_string(),
        "cam_right_wrist".to_string(),
        "cam_right_gripper_left_tactile".to_string(),
    ]
}

fn default_pointcloud_cameras() -> Vec<String> {
    vec!["cam_top".to_string(), "cam_right_wrist".to_string()]
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mov".to_string()]
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            video_cameras: default_video_cameras(),
            pointcloud_cameras: default_pointcloud_cameras(),
            video_extensions: default_video_extensions(),
        }
    }
}

/// Configuration for the sampling stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Worker pool width for per-frame point cloud sampling.
    #[serde(default = "default_sampler_threads")]
    pub sampler_threads: usize,
}

fn default_sampler_threads() -> usize {
    4
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sampler_threads: default_sampler_threads(),
        }
    }
}

/// Payload size ceilings for the size governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeConfig {
    /// Soft ceiling in MB: exceeding it triggers compression.
    #[serde(default = "default_soft_limit_mb")]
    pub soft_limit_mb: f64,

    /// Hard ceiling in MB: exceeding it after compression discards the payload.
    #[serde(default = "default_hard_limit_mb")]
    pub hard_limit_mb: f64,
}

fn default_soft_limit_mb() -> f64 {
    400.0
}

fn default_hard_limit_mb() -> f64 {
    450.0
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            soft_limit_mb: default_soft_limit_mb(),
            hard_limit_mb: default_hard_limit_mb(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub cameras: CameraConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub size: SizeConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
