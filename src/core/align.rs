//! Temporal alignment and frame downsampling.
//!
//! Downsampling is stride-based and deterministic, never random, so the
//! retained rows preserve the trajectory's shape. Timestamps are rescaled
//! into the associated video's time range for synchronized playback.

/// Auto frame-count policy thresholds, used only when neither a preset nor
/// an explicit cap was supplied.
const AUTO_KEEP_ALL_BELOW: usize = 2000;
const AUTO_MID_ROWS: usize = 5000;
const AUTO_MID_BUDGET: usize = 2000;
const AUTO_MAX_BUDGET: usize = 3000;

/// Number of frames to retain for a log of `rows` rows.
///
/// An explicit cap (from the caller or a quality preset) is authoritative;
/// without one, the auto policy keeps everything up to 2000 rows, 2000
/// frames up to 5000 rows, and 3000 frames beyond that.
pub fn frame_budget(rows: usize, cap: Option<usize>) -> usize {
    match cap {
        Some(m) => m.max(1),
        None => {
            if rows <= AUTO_KEEP_ALL_BELOW {
                rows
            } else if rows <= AUTO_MID_ROWS {
                AUTO_MID_BUDGET
            } else {
                AUTO_MAX_BUDGET
            }
        }
    }
}

/// Row indices retained when downsampling `rows` rows to at most `budget`.
///
/// Keeps indices `0, S, 2S, ...` with stride `S = max(1, rows / budget)`,
/// truncated to `budget` entries.
pub fn stride_indices(rows: usize, budget: usize) -> Vec<usize> {
    if rows == 0 || budget == 0 {
        return Vec::new();
    }

    let stride = (rows / budget).max(1);
    (0..rows).step_by(stride).take(budget).collect()
}

/// Rescale row timestamps into `[0, video_duration]`.
///
/// With no source timestamps, or a degenerate range (`max == min`), linear
/// timestamps are synthesized: spaced by `video_duration / frames`, or by
/// `1.0` when there is no video to align against.
pub fn normalize_timestamps(
    raw: Option<&[f64]>,
    frames: usize,
    video_duration: f64,
) -> Vec<f64> {
    let synthesize = || {
        let spacing = if video_duration > 0.0 {
            video_duration / frames.max(1) as f64
        } else {
            1.0
        };
        (0..frames).map(|i| i as f64 * spacing).collect::<Vec<f64>>()
    };

    let raw = match raw {
        Some(ts) if !ts.is_empty() => ts,
        _ => return synthesize(),
    };

    let min_t = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max_t = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max_t > min_t {
        raw.iter()
            .map(|&t| (t - min_t) / (max_t - min_t) * video_duration)
            .collect()
    } else {
        synthesize()
    }
}

/// Select the rows at `indices` from a per-row column.
pub fn take_rows<T: Clone>(rows: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| rows[i].clone()).collect()
}
