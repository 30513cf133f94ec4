//! Eye aspect ratio extraction and eye-state classification.
//!
//! `EAR = (||p2 - p6|| + ||p3 - p5||) / (2 * ||p1 - p4||)` over the six
//! ordered eye points (outer corner, two upper lid points, inner corner,
//! two lower lid points). Low values indicate closure.

use vigil_models::config::EarConfig;
use vigil_models::geometry::Point;
use vigil_models::landmarks::EYE_POINTS;
use vigil_models::states::EyeState;

use crate::stats::{RollingWindow, WindowStats};

/// Samples kept for per-eye statistics and smoothing.
const HISTORY_CAPACITY: usize = 30;
/// Moving-average width for the reported EAR value.
const SMOOTHING_SAMPLES: usize = 3;
/// An eye whose raw EAR falls outside this band gets down-weighted.
const PLAUSIBLE_EAR: std::ops::RangeInclusive<f64> = 0.1..=0.5;
const OUTLIER_WEIGHT: f64 = 0.7;

/// EAR for a single eye. A zero-width eye yields 0.0.
pub fn eye_aspect_ratio(eye: &[Point; EYE_POINTS]) -> f64 {
    let [p1, p2, p3, p4, p5, p6] = eye;

    let vertical_1 = p2.distance(p6);
    let vertical_2 = p3.distance(p5);
    let horizontal = p1.distance(p4);

    if horizontal == 0.0 {
        return 0.0;
    }
    (vertical_1 + vertical_2) / (2.0 * horizontal)
}

/// Weighted mean EAR over both eyes.
///
/// An eye with an implausible ratio is down-weighted so a partially
/// occluded eye does not drag the estimate. If either eye reads zero the
/// combined value is 0.0.
pub fn combined_ear(left: &[Point; EYE_POINTS], right: &[Point; EYE_POINTS]) -> f64 {
    let left_ear = eye_aspect_ratio(left);
    let right_ear = eye_aspect_ratio(right);

    if left_ear <= 0.0 || right_ear <= 0.0 {
        return 0.0;
    }

    let weight = |ear: f64| {
        if PLAUSIBLE_EAR.contains(&ear) {
            1.0
        } else {
            OUTLIER_WEIGHT
        }
    };
    let left_weight = weight(left_ear);
    let right_weight = weight(right_ear);

    (left_ear * left_weight + right_ear * right_weight) / (left_weight + right_weight)
}

/// Stateful eye classifier.
///
/// Maintains the below-blink-threshold consecutive-frame counter and the
/// below-drowsy-threshold start timestamp; `Drowsy` is only reached after
/// the configured sustained duration.
#[derive(Debug)]
pub struct EyeTracker {
    config: EarConfig,
    consecutive_frames: u32,
    below_start: Option<f64>,
    total_blinks: u64,
    history: RollingWindow,
}

impl EyeTracker {
    pub fn new(config: EarConfig) -> Self {
        Self {
            config,
            consecutive_frames: 0,
            below_start: None,
            total_blinks: 0,
            history: RollingWindow::new(HISTORY_CAPACITY),
        }
    }

    /// Feed one frame's eye regions. Returns the smoothed EAR and the
    /// classified state.
    pub fn update(
        &mut self,
        left: &[Point; EYE_POINTS],
        right: &[Point; EYE_POINTS],
        timestamp: f64,
    ) -> (f64, EyeState) {
        let raw = combined_ear(left, right);
        self.history.push(raw);

        let ear = if self.history.len() >= SMOOTHING_SAMPLES {
            self.history
                .recent_mean(SMOOTHING_SAMPLES)
                .unwrap_or(raw)
        } else {
            raw
        };

        if ear < self.config.blink_threshold {
            self.consecutive_frames += 1;
        } else {
            if self.consecutive_frames >= self.config.blink_frames {
                self.total_blinks += 1;
            }
            self.consecutive_frames = 0;
        }

        if ear < self.config.drowsy_threshold {
            self.below_start.get_or_insert(timestamp);
        } else {
            self.below_start = None;
        }

        (ear, self.classify(ear, timestamp))
    }

    fn classify(&self, ear: f64, timestamp: f64) -> EyeState {
        if let Some(start) = self.below_start {
            if timestamp - start >= self.config.drowsy_duration {
                return EyeState::Drowsy;
            }
        }
        if ear < self.config.drowsy_threshold {
            EyeState::Closing
        } else if self.consecutive_frames > 0 {
            EyeState::Blinking
        } else {
            EyeState::Open
        }
    }

    /// Blinks confirmed this session.
    pub fn total_blinks(&self) -> u64 {
        self.total_blinks
    }

    /// Statistics over the recent EAR history.
    pub fn statistics(&self) -> WindowStats {
        self.history.stats()
    }

    /// Clear all per-session state.
    pub fn reset(&mut self) {
        self.consecutive_frames = 0;
        self.below_start = None;
        self.total_blinks = 0;
        self.history.clear();
    }
}
