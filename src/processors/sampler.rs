//! Per-frame point cloud sampling.
//!
//! Each frame's raw buffer is shaped into 3-D points, filtered to finite
//! values, and randomly subsampled to a per-frame cap. Sampling is pure and
//! per-frame independent, so frames are processed in parallel on a fixed
//! width worker pool; the collected results keep the input frame order.

use rand::seq::index::sample;
use rand::thread_rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Adaptive per-frame point cap thresholds: fewer retained frames afford a
/// denser per-frame cloud under the same total-size budget.
const DENSE_FRAME_LIMIT: usize = 1000;
const MID_FRAME_LIMIT: usize = 2000;
const DENSE_POINT_CAP: usize = 2000;
const MID_POINT_CAP: usize = 1500;
const SPARSE_POINT_CAP: usize = 1000;

/// Per-frame point cap for an episode with `retained_frames` frames, used
/// when no preset or explicit cap applies.
pub fn adaptive_point_cap(retained_frames: usize) -> usize {
    if retained_frames <= DENSE_FRAME_LIMIT {
        DENSE_POINT_CAP
    } else if retained_frames <= MID_FRAME_LIMIT {
        MID_POINT_CAP
    } else {
        SPARSE_POINT_CAP
    }
}

/// Build the fixed-width worker pool used for frame sampling.
pub fn sampler_pool(threads: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    ThreadPoolBuilder::new().num_threads(threads.max(1)).build()
}

/// Sample one frame's raw point buffer down to at most `cap` points.
///
/// The flat buffer is reshaped into xyz triplets; a length not divisible by
/// 3 yields an empty sample, as does a buffer with no finite points. When
/// the valid count exceeds the cap, a uniform random subset is drawn without
/// replacement; otherwise every valid point is kept. `None` means uncapped.
///
/// Point identity is not preserved across frames: each frame samples
/// independently.
pub fn sample_points(raw: &[f32], cap: Option<usize>) -> Vec<[f32; 3]> {
    if raw.is_empty() || raw.len() % 3 != 0 {
        return Vec::new();
    }

    let valid: Vec<[f32; 3]> = raw
        .chunks_exact(3)
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .map(|p| [p[0], p[1], p[2]])
        .collect();

    let cap = match cap {
        Some(cap) => cap,
        None => return valid,
    };

    if valid.len() <= cap {
        return valid;
    }
    if cap == 0 {
        return Vec::new();
    }

    let mut rng = thread_rng();
    let mut indices: Vec<usize> = sample(&mut rng, valid.len(), cap).into_iter().collect();
    // Sorted indices keep the sample in source order and access cache-friendly.
    indices.sort_unstable();

    indices.into_iter().map(|i| valid[i]).collect()
}

/// Sample every frame of one camera stream in parallel.
///
/// Result order matches input frame order: `result[i]` is the sample for
/// `frames[i]`.
pub fn sample_frames(
    frames: &[Vec<f32>],
    cap: Option<usize>,
    pool: &ThreadPool,
) -> Vec<Vec<[f32; 3]>> {
    pool.install(|| {
        frames
            .par_iter()
            .map(|raw| sample_points(raw, cap))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adaptive_point_cap() {
        assert_eq!(adaptive_point_cap(0), 2000);
        assert_eq!(adaptive_point_cap(1000), 2000);
        assert_eq!(adaptive_point_cap(1001), 1500);
        assert_eq!(adaptive_point_cap(2000), 1500);
        assert_eq!(adaptive_point_cap(2001), 1000);
        assert_eq!(adaptive_point_cap(10_000), 1000);
    }

    #[test]
    fn test_sample_points_keeps_all_under_cap() {
        let raw = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let points = sample_points(&raw, Some(10));

        assert_eq!(points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_sample_points_exact_at_cap() {
        // Cap equal to the valid count must not subsample.
        let raw: Vec<f32> = (0..300).map(|i| i as f32).collect();
        let points = sample_points(&raw, Some(100));
        assert_eq!(points.len(), 100);
        assert_eq!(points[0], [0.0, 1.0, 2.0]);
        assert_eq!(points[99], [297.0, 298.0, 299.0]);
    }

    #[test]
    fn test_sample_points_subsamples_over_cap() {
        let raw: Vec<f32> = (0..3000).map(|i| i as f32).collect();
        let points = sample_points(&raw, Some(50));

        assert_eq!(points.len(), 50);
        for p in &points {
            assert!(p.iter().all(|v| v.is_finite()));
            // Every sampled point is a real source triplet.
            assert_eq!(p[1], p[0] + 1.0);
            assert_eq!(p[2], p[0] + 2.0);
        }
    }

    #[test]
    fn test_sample_points_uncapped() {
        let raw: Vec<f32> = (0..3000).map(|i| i as f32).collect();
        let points = sample_points(&raw, None);
        assert_eq!(points.len(), 1000);
    }

    #[test]
    fn test_sample_points_rejects_bad_shape() {
        assert!(sample_points(&[1.0, 2.0], Some(10)).is_empty());
        assert!(sample_points(&[1.0, 2.0, 3.0, 4.0], Some(10)).is_empty());
        assert!(sample_points(&[], Some(10)).is_empty());
    }

    #[test]
    fn test_sample_points_filters_non_finite() {
        let raw = vec![
            1.0,
            2.0,
            3.0,
            f32::NAN,
            5.0,
            6.0,
            7.0,
            f32::INFINITY,
            9.0,
            10.0,
            11.0,
            12.0,
        ];
        let points = sample_points(&raw, Some(10));

        assert_eq!(points, vec![[1.0, 2.0, 3.0], [10.0, 11.0, 12.0]]);
    }

    #[test]
    fn test_sample_points_all_nan_is_empty() {
        let raw = vec![f32::NAN; 9];
        assert!(sample_points(&raw, Some(10)).is_empty());
    }

    #[test]
    fn test_sample_frames_preserves_order() {
        let frames: Vec<Vec<f32>> = (0..64)
            .map(|i| vec![i as f32, 0.0, 0.0])
            .collect();
        let pool = sampler_pool(4).unwrap();

        let samples = sample_frames(&frames, Some(5), &pool);

        assert_eq!(samples.len(), 64);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.len(), 1);
            assert_eq!(sample[0][0], i as f32);
        }
    }

    #[test]
    fn test_sample_frames_malformed_frame_stays_empty() {
        let frames = vec![
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0], // bad shape
            vec![f32::NAN; 6],
            vec![4.0, 5.0, 6.0],
        ];
        let pool = sampler_pool(2).unwrap();

        let samples = sample_frames(&frames, Some(10), &pool);

        assert_eq!(samples[0].len(), 1);
        assert!(samples[1].is_empty());
        assert!(samples[2].is_empty());
        assert_eq!(samples[3].len(), 1);
    }
}
