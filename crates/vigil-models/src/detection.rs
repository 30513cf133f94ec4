//! Per-frame detection results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::states::{AlertLevel, EyeState, FatigueState, HeadState, MouthState};

/// Head rotation angles in degrees, recovered by the pose solver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPose {
    /// Nodding angle; positive tilts the head down toward the chest.
    pub pitch: f64,
    /// Left/right rotation.
    pub yaw: f64,
    /// Sideways tilt (ear toward shoulder).
    pub roll: f64,
}

impl HeadPose {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Magnitude of the nodding angle, the value classification runs on.
    pub fn abs_pitch(&self) -> f64 {
        self.pitch.abs()
    }
}

/// The scalar metrics extracted from one frame.
///
/// A `None` field means that signal was unavailable this frame (missing
/// region or pose-solver failure) and is excluded from fusion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSample {
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub head_pose: Option<HeadPose>,
}

/// Full fusion output for one successfully processed frame.
///
/// Created once per frame by the detection stage, appended to the session's
/// bounded history, and read-only afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Frame capture timestamp in seconds (session-monotonic).
    pub timestamp: f64,
    /// Wall-clock stamp for history export.
    pub wall_clock: DateTime<Utc>,
    /// Smoothed eye aspect ratio, if the eye regions were present.
    pub ear: Option<f64>,
    /// Mouth aspect ratio, if the mouth region was present.
    pub mar: Option<f64>,
    /// Recovered head pose, if the solver converged.
    pub head_pose: Option<HeadPose>,
    pub eye_state: EyeState,
    pub mouth_state: MouthState,
    pub head_state: HeadState,
    pub alert_level: AlertLevel,
    pub fatigue_state: FatigueState,
    /// Fusion confidence in [0, 1].
    pub confidence: f64,
    /// Human-readable names of the high-risk states currently active.
    pub contributing_factors: Vec<String>,
    /// Driver-facing recommendation for the alert level.
    pub recommendation: String,
}

impl DetectionResult {
    /// Sample view of the scalar metrics.
    pub fn sample(&self) -> SignalSample {
        SignalSample {
            ear: self.ear,
            mar: self.mar,
            head_pose: self.head_pose,
        }
    }

    /// Whether this frame should reach the alert sink.
    pub fn is_alerting(&self) -> bool {
        self.alert_level.is_alerting()
    }
}
