//! Episode processing modules.

pub mod episodes;
pub mod sampler;
pub mod size_guard;

// Re-export key types for convenience
pub use episodes::{parse_episodes, EpisodeRecord, FileRef, MotorData};
pub use sampler::{adaptive_point_cap, sample_frames, sample_points};
pub use size_guard::{estimate_payload_mb, finalize_payload, Payload};
