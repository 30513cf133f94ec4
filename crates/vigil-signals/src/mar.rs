//! Mouth aspect ratio extraction and mouth-state classification.
//!
//! `MAR = (||top_l - bottom_l|| + ||top_r - bottom_r||) / (2 * ||corner_l - corner_r||)`
//! over the six ordered mouth points (left corner, top left, top right,
//! right corner, bottom right, bottom left). High values indicate an open
//! mouth; sustained high values indicate a yawn.

use vigil_models::config::MarConfig;
use vigil_models::geometry::Point;
use vigil_models::landmarks::MOUTH_POINTS;
use vigil_models::states::MouthState;

use crate::stats::{RollingWindow, WindowStats};

const HISTORY_CAPACITY: usize = 30;

/// MAR for the mouth region. A zero-width mouth yields 0.0.
pub fn mouth_aspect_ratio(mouth: &[Point; MOUTH_POINTS]) -> f64 {
    let [left_corner, top_left, top_right, right_corner, bottom_right, bottom_left] = mouth;

    let vertical_left = top_left.distance(bottom_left);
    let vertical_right = top_right.distance(bottom_right);
    let horizontal = left_corner.distance(right_corner);

    if horizontal == 0.0 {
        return 0.0;
    }
    (vertical_left + vertical_right) / (2.0 * horizontal)
}

/// Stateful mouth classifier.
///
/// The yawn timer starts when MAR crosses the yawn threshold; a yawn is
/// only added to the session total once MAR drops back below the threshold
/// after having stayed above it for the configured duration.
#[derive(Debug)]
pub struct MouthTracker {
    config: MarConfig,
    yawn_start: Option<f64>,
    total_yawns: u64,
    history: RollingWindow,
}

impl MouthTracker {
    pub fn new(config: MarConfig) -> Self {
        Self {
            config,
            yawn_start: None,
            total_yawns: 0,
            history: RollingWindow::new(HISTORY_CAPACITY),
        }
    }

    /// Feed one frame's mouth region. Returns the MAR and the classified
    /// state.
    pub fn update(&mut self, mouth: &[Point; MOUTH_POINTS], timestamp: f64) -> (f64, MouthState) {
        let mar = mouth_aspect_ratio(mouth);
        self.history.push(mar);

        if mar >= self.config.yawn_threshold {
            self.yawn_start.get_or_insert(timestamp);
        } else if let Some(start) = self.yawn_start.take() {
            if timestamp - start >= self.config.yawn_duration {
                self.total_yawns += 1;
            }
        }

        (mar, self.classify(mar, timestamp))
    }

    fn classify(&self, mar: f64, timestamp: f64) -> MouthState {
        if let Some(start) = self.yawn_start {
            if timestamp - start >= self.config.yawn_duration {
                return MouthState::Yawning;
            }
        }
        if mar >= self.config.yawn_threshold {
            MouthState::WideOpen
        } else if mar >= self.config.speaking_threshold {
            MouthState::Speaking
        } else {
            MouthState::Closed
        }
    }

    /// Yawns confirmed this session.
    pub fn total_yawns(&self) -> u64 {
        self.total_yawns
    }

    /// Statistics over the recent MAR history.
    pub fn statistics(&self) -> WindowStats {
        self.history.stats()
    }

    /// Clear all per-session state.
    pub fn reset(&mut self) {
        self.yawn_start = None;
        self.total_yawns = 0;
        self.history.clear();
    }
}
