//! Signal extraction and per-signal state classification.
//!
//! This crate provides:
//! - Pure aspect-ratio metrics over landmark regions (EAR, MAR)
//! - A perspective pose solver for head pitch/yaw/roll
//! - Stateful trackers that debounce each metric into a categorical state
//!
//! Trackers consume the frame timestamp rather than reading a clock, so
//! every state machine is deterministic under test.

pub mod ear;
pub mod head_pose;
pub mod mar;
pub mod pnp;
pub mod stats;

pub use ear::{combined_ear, eye_aspect_ratio, EyeTracker};
pub use head_pose::{HeadPoseEstimator, HeadTracker};
pub use mar::{mouth_aspect_ratio, MouthTracker};
pub use stats::RollingWindow;
