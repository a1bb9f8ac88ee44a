//! Video asset resolution and duration probing.
//!
//! Videos are only probed for their container duration, never decoded.
//! A missing or unreadable video is a soft failure: the camera slot stays
//! absent and the duration contribution is 0.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};

/// Resolved video files for one episode, keyed by camera name.
///
/// A camera with no resolvable file keeps `None`; that is expected for
/// partially recorded episodes and is not an error.
#[derive(Debug, Clone, Default)]
pub struct VideoAssetSet {
    pub paths: BTreeMap<String, Option<PathBuf>>,
}

impl VideoAssetSet {
    /// Iterate over the resolved paths only.
    pub fn resolved(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.values().filter_map(|p| p.as_ref())
    }

    /// Number of cameras with a resolved file.
    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }
}

/// Resolve the video file for each camera of an episode.
///
/// For every camera, tries `<folder>/<camera>/<key>.<ext>` for each extension
/// in order; the first existing file wins.
pub fn resolve_video_assets(
    folder: &Path,
    key: &str,
    cameras: &[String],
    extensions: &[String],
) -> VideoAssetSet {
    let mut paths = BTreeMap::new();

    for camera in cameras {
        let mut found = None;
        for ext in extensions {
            let candidate = folder.join(camera).join(format!("{}.{}", key, ext));
            if candidate.exists() {
                info!("found video for {}: {}", camera, candidate.display());
                found = Some(candidate);
                break;
            }
        }
        if found.is_none() {
            warn!("no video file for camera {} ({})", camera, key);
        }
        paths.insert(camera.clone(), found);
    }

    VideoAssetSet { paths }
}

/// Probe a video file's container duration in seconds.
///
/// Invokes `ffprobe` and parses its JSON output. Every failure mode (missing
/// binary, missing file, corrupt container, unparseable output) returns `0.0`
/// with a warning; a broken video must never abort episode processing.
pub fn probe_duration(path: &Path) -> f64 {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration",
        ])
        .arg(path)
        .output();

    let output = match output {
        Ok(out) => out,
        Err(e) => {
            warn!("ffprobe failed for {}: {}", path.display(), e);
            return 0.0;
        }
    };

    if !output.status.success() {
        warn!("ffprobe exited with {} for {}", output.status, path.display());
        return 0.0;
    }

    let duration = serde_json::from_slice::<serde_json::Value>(&output.stdout)
        .ok()
        .and_then(|json| {
            json.get("format")
                .and_then(|f| f.get("duration"))
                .and_then(|d| d.as_str())
                .and_then(|s| s.parse::<f64>().ok())
        });

    match duration {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            info!("video {} duration: {}s", path.display(), seconds);
            seconds
        }
        _ => {
            warn!("no usable duration in ffprobe output for {}", path.display());
            0.0
        }
    }
}

/// Maximum probed duration across all resolved camera assets, 0 if none.
pub fn max_duration(assets: &VideoAssetSet) -> f64 {
    assets
        .resolved()
        .map(|path| probe_duration(path))
        .fold(0.0, f64::max)
}
