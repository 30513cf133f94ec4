//! Shared data models for the Vigil fatigue-detection engine.
//!
//! This crate provides Serde-serializable types for:
//! - Facial landmark frames and region extraction
//! - Categorical signal states and alert levels
//! - Per-frame detection results
//! - Threshold configuration with named presets

pub mod config;
pub mod detection;
pub mod geometry;
pub mod landmarks;
pub mod states;

// Re-export common types
pub use config::{ConfigError, EarConfig, FatigueConfig, FusionConfig, HeadPoseConfig, MarConfig};
pub use detection::{DetectionResult, HeadPose, SignalSample};
pub use geometry::Point;
pub use landmarks::{FaceRegions, LabeledPoint, LandmarkFrame, RegionLabel};
pub use states::{AlertLevel, EyeState, FatigueState, HeadState, MouthState};
