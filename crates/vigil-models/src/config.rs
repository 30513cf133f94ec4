//! Threshold configuration with named presets.
//!
//! Every numeric knob of the detection rules lives here, grouped per
//! signal, with three named presets (`default`, `sensitive`,
//! `conservative`) and load-time validation. Classifiers never re-check
//! these values at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("{name} must be within (0, 1), got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be positive, got {value}")]
    NonPositiveDuration { name: &'static str, value: f64 },

    #[error("head normal_threshold ({normal}) must be below drowsy_threshold ({drowsy})")]
    HeadThresholdOrder { normal: f64, drowsy: f64 },

    #[error("mouth speaking_threshold ({speaking}) must be below yawn_threshold ({yawn})")]
    MouthThresholdOrder { speaking: f64, yawn: f64 },

    #[error("combination_threshold must be within [1, 3], got {0}")]
    CombinationOutOfRange(u32),

    #[error("blink_frames must be at least 1, got {0}")]
    ZeroBlinkFrames(u32),
}

/// Eye-signal thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarConfig {
    /// EAR below this counts toward a blink.
    pub blink_threshold: f64,
    /// Consecutive below-threshold frames that confirm a blink.
    pub blink_frames: u32,
    /// EAR below this starts the drowsiness timer.
    pub drowsy_threshold: f64,
    /// Seconds below the drowsy threshold before the state becomes drowsy.
    pub drowsy_duration: f64,
}

impl Default for EarConfig {
    fn default() -> Self {
        Self {
            blink_threshold: 0.2,
            blink_frames: 3,
            drowsy_threshold: 0.2,
            drowsy_duration: 1.5,
        }
    }
}

/// Mouth-signal thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarConfig {
    /// MAR above this counts as a (potential) yawn.
    pub yawn_threshold: f64,
    /// Seconds above the yawn threshold before the state becomes yawning.
    pub yawn_duration: f64,
    /// MAR above this but below the yawn threshold counts as speaking.
    pub speaking_threshold: f64,
}

impl Default for MarConfig {
    fn default() -> Self {
        Self {
            yawn_threshold: 0.6,
            yawn_duration: 1.2,
            speaking_threshold: 0.4,
        }
    }
}

/// Head-pose thresholds, in degrees of pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPoseConfig {
    /// |pitch| above this leaves the normal state.
    pub normal_threshold: f64,
    /// |pitch| above this starts the drowsiness timer.
    pub drowsy_threshold: f64,
    /// Seconds above the drowsy threshold before the state becomes drowsy.
    pub drowsy_duration: f64,
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            normal_threshold: 10.0,
            drowsy_threshold: 15.0,
            drowsy_duration: 1.5,
        }
    }
}

/// Fusion and escalation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Simultaneous high-risk signals required for a HIGH alert.
    pub combination_threshold: u32,
    /// Seconds of continuous HIGH before promotion to CRITICAL.
    pub critical_duration: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            combination_threshold: 2,
            critical_duration: 3.0,
        }
    }
}

/// Complete threshold set for one detection session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FatigueConfig {
    pub ear: EarConfig,
    pub mar: MarConfig,
    pub head: HeadPoseConfig,
    pub fusion: FusionConfig,
}

impl FatigueConfig {
    /// The `sensitive` preset: earlier detection, more false positives.
    pub fn sensitive() -> Self {
        let mut config = Self::default();
        config.ear.drowsy_duration = 1.0;
        config.mar.yawn_duration = 0.8;
        config.head.drowsy_duration = 1.0;
        config.fusion.combination_threshold = 1;
        config.fusion.critical_duration = 2.0;
        config
    }

    /// The `conservative` preset: fewer false positives, later detection.
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.ear.drowsy_duration = 2.5;
        config.mar.yawn_duration = 2.0;
        config.head.drowsy_duration = 2.5;
        config.fusion.combination_threshold = 3;
        config.fusion.critical_duration = 5.0;
        config
    }

    /// Look up a named preset. The result is already validated.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let config = match name {
            "default" => Self::default(),
            "sensitive" => Self::sensitive(),
            "conservative" => Self::conservative(),
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the classifiers rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("ear.blink_threshold", self.ear.blink_threshold)?;
        check_unit_interval("ear.drowsy_threshold", self.ear.drowsy_threshold)?;
        check_unit_interval("mar.yawn_threshold", self.mar.yawn_threshold)?;
        check_unit_interval("mar.speaking_threshold", self.mar.speaking_threshold)?;

        check_positive("ear.drowsy_duration", self.ear.drowsy_duration)?;
        check_positive("mar.yawn_duration", self.mar.yawn_duration)?;
        check_positive("head.drowsy_duration", self.head.drowsy_duration)?;
        check_positive("head.normal_threshold", self.head.normal_threshold)?;
        check_positive("head.drowsy_threshold", self.head.drowsy_threshold)?;
        check_positive("fusion.critical_duration", self.fusion.critical_duration)?;

        if self.ear.blink_frames == 0 {
            return Err(ConfigError::ZeroBlinkFrames(self.ear.blink_frames));
        }
        if self.head.normal_threshold >= self.head.drowsy_threshold {
            return Err(ConfigError::HeadThresholdOrder {
                normal: self.head.normal_threshold,
                drowsy: self.head.drowsy_threshold,
            });
        }
        if self.mar.speaking_threshold >= self.mar.yawn_threshold {
            return Err(ConfigError::MouthThresholdOrder {
                speaking: self.mar.speaking_threshold,
                yawn: self.mar.yawn_threshold,
            });
        }
        if !(1..=3).contains(&self.fusion.combination_threshold) {
            return Err(ConfigError::CombinationOutOfRange(
                self.fusion.combination_threshold,
            ));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value >= 1.0 {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::NonPositiveDuration { name, value });
    }
    Ok(())
}
