//! Payload size governance.
//!
//! Estimates the serialized size from episode shape and re-strides every
//! record when the estimate exceeds the soft ceiling. If the serialized
//! payload still exceeds the hard ceiling the batch is discarded and a
//! structured error object is emitted instead. Downstream consumers have
//! fixed buffer limits, so an oversized payload must never leave this stage.

use log::{info, warn};

use crate::config::SizeConfig;
use crate::processors::episodes::EpisodeRecord;

const BYTES_PER_POINT: f64 = 12.0;
const BYTES_PER_FRAME: f64 = 100.0;
const MB: f64 = 1024.0 * 1024.0;

/// Divisors for the compression stride: `full` quality compresses more
/// gently than the capped presets.
const FULL_STRIDE_DIVISOR: f64 = 300.0;
const CAPPED_STRIDE_DIVISOR: f64 = 200.0;

/// Final payload, already serialized, or the reason it was discarded.
#[derive(Debug)]
pub enum Payload {
    /// JSON array of episode records.
    Episodes(String),
    /// The payload exceeded the hard ceiling (or failed to serialize) and
    /// was discarded.
    TooLarge(String),
}

impl Payload {
    /// The string to emit on the output channel. Always well-formed JSON:
    /// either the episode array or `{"error": ..., "episodes": []}`.
    pub fn into_json(self) -> String {
        match self {
            Self::Episodes(json) => json,
            Self::TooLarge(message) => error_object(&message),
        }
    }
}

/// Build the structured error object emitted instead of oversized data.
pub fn error_object(message: &str) -> String {
    serde_json::json!({ "error": message, "episodes": [] }).to_string()
}

fn estimate_episode_bytes(episode: &EpisodeRecord) -> f64 {
    let cameras = episode.pointcloud_data.len().max(1) as f64;
    let pc_frames = episode
        .pointcloud_data
        .values()
        .map(|frames| frames.len())
        .max()
        .unwrap_or(0) as f64;
    let total_points: usize = episode
        .pointcloud_data
        .values()
        .flat_map(|frames| frames.iter().map(|points| points.len()))
        .sum();

    let avg_points = if pc_frames > 0.0 {
        total_points as f64 / (pc_frames * cameras)
    } else {
        0.0
    };

    pc_frames * avg_points * BYTES_PER_POINT * cameras
        + episode.frame_count as f64 * BYTES_PER_FRAME
}

/// Estimate the serialized payload size in MB from episode shape.
pub fn estimate_payload_mb(episodes: &[EpisodeRecord]) -> f64 {
    episodes.iter().map(estimate_episode_bytes).sum::<f64>() / MB
}

/// Integer re-striding factor for an over-estimate payload.
pub fn compression_stride(estimate_mb: f64, full_quality: bool) -> usize {
    if full_quality {
        ((estimate_mb / FULL_STRIDE_DIVISOR).ceil() as usize).max(1)
    } else {
        ((estimate_mb / CAPPED_STRIDE_DIVISOR).ceil() as usize).max(2)
    }
}

/// Re-stride one episode along the frame axis and, for point clouds, the
/// point axis within every retained frame.
pub fn compress_episode(episode: &mut EpisodeRecord, stride: usize) {
    if stride <= 1 {
        return;
    }

    episode.motor_data.time = episode
        .motor_data
        .time
        .iter()
        .step_by(stride)
        .copied()
        .collect();
    episode.motor_data.motors = episode
        .motor_data
        .motors
        .iter()
        .step_by(stride)
        .cloned()
        .collect();

    for frames in episode.pointcloud_data.values_mut() {
        *frames = frames
            .iter()
            .step_by(stride)
            .map(|points| points.iter().step_by(stride).copied().collect())
            .collect();
    }

    episode.frame_count = episode.motor_data.time.len();
}

/// Run the full size-control pass and serialize the batch.
///
/// Never panics and never returns malformed output: the caller always gets
/// either the episode array or a structured error payload.
pub fn finalize_payload(
    mut episodes: Vec<EpisodeRecord>,
    full_quality: bool,
    size: &SizeConfig,
) -> Payload {
    let estimate_mb = estimate_payload_mb(&episodes);
    info!("estimated payload size: {:.2} MB", estimate_mb);

    if estimate_mb > size.soft_limit_mb {
        let stride = compression_stride(estimate_mb, full_quality);
        warn!(
            "estimate {:.1} MB exceeds soft limit {:.0} MB, compressing with stride {}",
            estimate_mb, size.soft_limit_mb, stride
        );
        for episode in &mut episodes {
            compress_episode(episode, stride);
        }
    }

    let json = match serde_json::to_string(&episodes) {
        Ok(json) => json,
        Err(e) => {
            return Payload::TooLarge(format!("failed to serialize episodes: {}", e));
        }
    };

    let actual_mb = json.len() as f64 / MB;
    info!("serialized JSON size: {:.2} MB", actual_mb);

    if actual_mb > size.hard_limit_mb {
        return Payload::TooLarge(format!(
            "serialized payload {:.1} MB exceeds hard limit {:.0} MB",
            actual_mb, size.hard_limit_mb
        ));
    }

    Payload::Episodes(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::episodes::MotorData;
    use std::collections::BTreeMap;

    fn test_episode(frames: usize, points_per_frame: usize) -> EpisodeRecord {
        let cloud: Vec<Vec<[f32; 3]>> = (0..frames)
            .map(|_| vec![[1.0, 2.0, 3.0]; points_per_frame])
            .collect();
        EpisodeRecord {
            key: "episode_000001".to_string(),
            index: 1,
            folder_path: "uploads".to_string(),
            frame_count: frames,
            video_paths: BTreeMap::new(),
            motor_data: MotorData {
                time: (0..frames).map(|i| i as f64).collect(),
                motors: (0..frames).map(|i| vec![i as f64; 6]).collect(),
            },
            pointcloud_data: BTreeMap::from([
                ("cam_top".to_string(), cloud.clone()),
                ("cam_right_wrist".to_string(), cloud),
            ]),
        }
    }

    #[test]
    fn test_estimate_matches_shape_formula() {
        // 100 frames x 50 points x 12 bytes x 2 cameras + 100 x 100 bytes
        let episode = test_episode(100, 50);
        let expected = (100.0 * 50.0 * 12.0 * 2.0 + 100.0 * 100.0) / (1024.0 * 1024.0);
        let estimate = estimate_payload_mb(&[episode]);
        assert!((estimate - expected).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_empty_batch() {
        assert_eq!(estimate_payload_mb(&[]), 0.0);
    }

    #[test]
    fn test_compression_stride_full_quality() {
        assert_eq!(compression_stride(250.0, true), 1);
        assert_eq!(compression_stride(500.0, true), 2);
        assert_eq!(compression_stride(900.0, true), 3);
    }

    #[test]
    fn test_compression_stride_capped_quality() {
        // Capped presets always compress by at least 2.
        assert_eq!(compression_stride(100.0, false), 2);
        assert_eq!(compression_stride(500.0, false), 3);
        assert_eq!(compression_stride(801.0, false), 5);
    }

    #[test]
    fn test_compress_reduces_both_axes() {
        let mut episode = test_episode(100, 40);
        compress_episode(&mut episode, 2);

        assert_eq!(episode.frame_count, 50);
        assert_eq!(episode.motor_data.time.len(), 50);
        assert_eq!(episode.motor_data.motors.len(), 50);
        for frames in episode.pointcloud_data.values() {
            assert_eq!(frames.len(), 50);
            for points in frames {
                assert_eq!(points.len(), 20);
            }
        }
    }

    #[test]
    fn test_compress_stride_one_is_noop() {
        let mut episode = test_episode(10, 5);
        compress_episode(&mut episode, 1);
        assert_eq!(episode.frame_count, 10);
        assert_eq!(episode.pointcloud_data["cam_top"][0].len(), 5);
    }

    #[test]
    fn test_finalize_small_payload_passes_through() {
        let size = SizeConfig::default();
        let payload = finalize_payload(vec![test_episode(10, 5)], false, &size);

        match payload {
            Payload::Episodes(json) => {
                let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
                assert_eq!(parsed.as_array().unwrap().len(), 1);
                assert_eq!(parsed[0]["frame_count"], 10);
            }
            Payload::TooLarge(msg) => panic!("unexpected TooLarge: {}", msg),
        }
    }

    #[test]
    fn test_finalize_compresses_over_soft_limit() {
        let size = SizeConfig {
            soft_limit_mb: 0.001,
            hard_limit_mb: 450.0,
        };
        let payload = finalize_payload(vec![test_episode(100, 40)], false, &size);

        // Estimate ~0.1 MB over a 0.001 MB soft limit: stride clamps to 2.
        match payload {
            Payload::Episodes(json) => {
                let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
                assert_eq!(parsed[0]["frame_count"], 50);
                assert_eq!(parsed[0]["pointcloud_data"]["cam_top"][0].as_array().unwrap().len(), 20);
            }
            Payload::TooLarge(msg) => panic!("unexpected TooLarge: {}", msg),
        }
    }

    #[test]
    fn test_finalize_fails_closed_over_hard_limit() {
        let size = SizeConfig {
            soft_limit_mb: 400.0,
            hard_limit_mb: 0.000001,
        };
        let payload = finalize_payload(vec![test_episode(10, 5)], false, &size);

        let json = payload.into_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["error"].is_string());
        assert_eq!(parsed["episodes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_error_object_shape() {
        let json = error_object("boom");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["error"], "boom");
        assert!(parsed["episodes"].as_array().unwrap().is_empty());
    }
}
