//! Per-session detection state.
//!
//! A [`Session`] owns every piece of mutable tracking state for one
//! monitoring run: the three signal classifiers, the fusion engine, the
//! bounded detection history, and the session counters. The pipeline's
//! detection stage drives it one frame at a time; export/query
//! collaborators read it behind the pipeline's lock.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use vigil_models::config::{ConfigError, FatigueConfig};
use vigil_models::detection::DetectionResult;
use vigil_models::landmarks::LandmarkFrame;
use vigil_models::states::{AlertLevel, EyeState, FatigueState, HeadState, MouthState};

use vigil_signals::ear::EyeTracker;
use vigil_signals::head_pose::{HeadPoseEstimator, HeadTracker};
use vigil_signals::mar::MouthTracker;
use vigil_signals::stats::WindowStats;

use crate::fusion::FusionEngine;

/// Detection results kept for recent-history queries.
const HISTORY_CAPACITY: usize = 50;

/// Aggregated view of a session's recent activity.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub window_secs: f64,
    pub total_detections: usize,
    /// Count of history entries per alert level within the window.
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub average_confidence: f64,
    pub latest_state: Option<FatigueState>,
    pub total_alerts: u64,
    pub total_blinks: u64,
    pub total_yawns: u64,
}

/// All mutable state for one monitoring session.
pub struct Session {
    id: Uuid,
    config: FatigueConfig,
    started_at: DateTime<Utc>,
    eye: EyeTracker,
    mouth: MouthTracker,
    head: HeadTracker,
    fusion: FusionEngine,
    /// Pose estimator cached per frame size.
    estimator: Option<(u32, u32, HeadPoseEstimator)>,
    history: VecDeque<DetectionResult>,
    total_alerts: u64,
}

impl Session {
    /// Create a session from a validated configuration.
    pub fn new(config: FatigueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let id = Uuid::new_v4();
        info!(session_id = %id, "starting detection session");

        Ok(Self {
            id,
            config,
            started_at: Utc::now(),
            eye: EyeTracker::new(config.ear),
            mouth: MouthTracker::new(config.mar),
            head: HeadTracker::new(config.head),
            fusion: FusionEngine::new(config.fusion),
            estimator: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            total_alerts: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &FatigueConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Process one landmark frame through extract -> classify -> fuse.
    ///
    /// Absent regions leave their classifier untouched and contribute the
    /// neutral state to fusion; the frame still produces a result.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> DetectionResult {
        let timestamp = frame.timestamp;
        let regions = &frame.regions;

        let (ear, eye_state) = match (&regions.left_eye, &regions.right_eye) {
            (Some(left), Some(right)) => {
                let (value, state) = self.eye.update(left, right, timestamp);
                (Some(value), state)
            }
            _ => (None, EyeState::Open),
        };

        let (mar, mouth_state) = match &regions.mouth {
            Some(mouth) => {
                let (value, state) = self.mouth.update(mouth, timestamp);
                (Some(value), state)
            }
            None => (None, MouthState::Closed),
        };

        let head_pose = self
            .estimator_for(frame.width, frame.height)
            .estimate(regions);
        let head_state = match &head_pose {
            Some(pose) => self.head.update(pose, timestamp),
            None => HeadState::Normal,
        };

        let decision = self
            .fusion
            .evaluate(eye_state, mouth_state, head_state, timestamp);

        if decision.alert_level.is_alerting() {
            self.total_alerts += 1;
            warn!(
                session_id = %self.id,
                level = %decision.alert_level,
                confidence = decision.confidence,
                "fatigue alert: {}",
                decision.recommendation
            );
        }

        let result = DetectionResult {
            timestamp,
            wall_clock: Utc::now(),
            ear,
            mar,
            head_pose,
            eye_state,
            mouth_state,
            head_state,
            alert_level: decision.alert_level,
            fatigue_state: decision.fatigue_state,
            confidence: decision.confidence,
            contributing_factors: decision
                .contributing_factors
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recommendation: decision.recommendation.to_string(),
        };

        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(result.clone());

        result
    }

    fn estimator_for(&mut self, width: u32, height: u32) -> &HeadPoseEstimator {
        let stale = !matches!(&self.estimator, Some((w, h, _)) if *w == width && *h == height);
        if stale {
            self.estimator = Some((width, height, HeadPoseEstimator::new(width, height)));
        }
        &self.estimator.as_ref().expect("estimator just set").2
    }

    /// Most recent detection result, if any.
    pub fn latest(&self) -> Option<&DetectionResult> {
        self.history.back()
    }

    /// The `count` most recent results, newest last.
    pub fn recent(&self, count: usize) -> Vec<DetectionResult> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn total_alerts(&self) -> u64 {
        self.total_alerts
    }

    pub fn total_blinks(&self) -> u64 {
        self.eye.total_blinks()
    }

    pub fn total_yawns(&self) -> u64 {
        self.mouth.total_yawns()
    }

    /// Summarize history entries whose timestamp falls within
    /// `window_secs` of the latest one.
    pub fn summary(&self, window_secs: f64) -> SessionSummary {
        let newest = self.history.back().map(|r| r.timestamp).unwrap_or(0.0);
        let recent: Vec<&DetectionResult> = self
            .history
            .iter()
            .filter(|r| newest - r.timestamp <= window_secs)
            .collect();

        let count_level = |level: AlertLevel| {
            recent.iter().filter(|r| r.alert_level == level).count()
        };
        let average_confidence = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|r| r.confidence).sum::<f64>() / recent.len() as f64
        };

        SessionSummary {
            session_id: self.id,
            window_secs,
            total_detections: recent.len(),
            none: count_level(AlertLevel::None),
            low: count_level(AlertLevel::Low),
            medium: count_level(AlertLevel::Medium),
            high: count_level(AlertLevel::High),
            critical: count_level(AlertLevel::Critical),
            average_confidence,
            latest_state: self.history.back().map(|r| r.fatigue_state),
            total_alerts: self.total_alerts,
            total_blinks: self.total_blinks(),
            total_yawns: self.total_yawns(),
        }
    }

    /// Export the full session state for external analysis.
    pub fn export(&self) -> serde_json::Value {
        let stats = |s: WindowStats| {
            serde_json::json!({
                "mean": s.mean,
                "std_dev": s.std_dev,
                "min": s.min,
                "max": s.max,
                "count": s.count,
            })
        };

        serde_json::json!({
            "session_id": self.id,
            "started_at": self.started_at,
            "detection_history": &self.history,
            "ear_statistics": stats(self.eye.statistics()),
            "mar_statistics": stats(self.mouth.statistics()),
            "head_statistics": stats(self.head.statistics()),
            "total_alerts": self.total_alerts,
            "summary": self.summary(60.0),
        })
    }

    /// Clear every piece of per-session state; the session id is kept.
    pub fn reset(&mut self) {
        self.eye.reset();
        self.mouth.reset();
        self.head.reset();
        self.fusion.reset();
        self.history.clear();
        self.total_alerts = 0;
        self.started_at = Utc::now();
        info!(session_id = %self.id, "detection session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::geometry::Point;
    use vigil_models::landmarks::{FaceRegions, EYE_POINTS, MOUTH_POINTS};

    fn eye(opening: f64) -> [Point; EYE_POINTS] {
        [
            Point::new(0.0, 0.0, 0.0),
            Point::new(3.0, -opening / 2.0, 0.0),
            Point::new(7.0, -opening / 2.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
            Point::new(7.0, opening / 2.0, 0.0),
            Point::new(3.0, opening / 2.0, 0.0),
        ]
    }

    fn mouth(opening: f64) -> [Point; MOUTH_POINTS] {
        [
            Point::new(0.0, 0.0, 0.0),
            Point::new(3.0, -opening / 2.0, 0.0),
            Point::new(7.0, -opening / 2.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
            Point::new(7.0, opening / 2.0, 0.0),
            Point::new(3.0, opening / 2.0, 0.0),
        ]
    }

    /// Frame with closed-ish eyes and a wide-open mouth; no pose regions,
    /// so the head signal stays neutral.
    fn drowsy_frame(timestamp: f64) -> LandmarkFrame {
        LandmarkFrame {
            timestamp,
            width: 640,
            height: 480,
            regions: FaceRegions {
                left_eye: Some(eye(1.5)),  // EAR 0.15
                right_eye: Some(eye(1.5)),
                mouth: Some(mouth(8.0)), // MAR 0.8
                nose: None,
                face_outline: None,
            },
        }
    }

    fn calm_frame(timestamp: f64) -> LandmarkFrame {
        LandmarkFrame {
            timestamp,
            width: 640,
            height: 480,
            regions: FaceRegions {
                left_eye: Some(eye(3.0)), // EAR 0.3
                right_eye: Some(eye(3.0)),
                mouth: Some(mouth(1.0)), // MAR 0.1
                nose: None,
                face_outline: None,
            },
        }
    }

    fn no_face_frame(timestamp: f64) -> LandmarkFrame {
        LandmarkFrame {
            timestamp,
            width: 640,
            height: 480,
            regions: FaceRegions::default(),
        }
    }

    fn session() -> Session {
        Session::new(FatigueConfig::default()).expect("valid config")
    }

    fn run_until(session: &mut Session, from: f64, to: f64, frame: fn(f64) -> LandmarkFrame) -> DetectionResult {
        let mut t = from;
        let mut last = session.process_frame(&frame(t));
        while t < to {
            t += 1.0 / 30.0;
            last = session.process_frame(&frame(t));
        }
        last
    }

    #[test]
    fn test_drowsy_plus_yawn_escalates_to_critical() {
        let mut session = session();

        // Both signals need their sustained durations (1.5s eyes, 1.2s
        // mouth) before the frame counts two high risks -> HIGH
        let result = run_until(&mut session, 0.0, 1.6, drowsy_frame);
        assert_eq!(result.eye_state, EyeState::Drowsy);
        assert_eq!(result.mouth_state, MouthState::Yawning);
        assert_eq!(result.alert_level, AlertLevel::High);

        // HIGH sustained 3.0s from its onset promotes to CRITICAL
        let result = run_until(&mut session, 1.6, 4.7, drowsy_frame);
        assert_eq!(result.alert_level, AlertLevel::Critical);
        assert_eq!(result.fatigue_state, FatigueState::DangerouslyDrowsy);
        assert!(result.confidence >= 1.0 - 1e-12);
    }

    #[test]
    fn test_no_face_frame_is_neutral() {
        let mut session = session();
        let result = session.process_frame(&no_face_frame(0.0));

        assert_eq!(result.alert_level, AlertLevel::None);
        assert_eq!(result.eye_state, EyeState::Open);
        assert_eq!(result.mouth_state, MouthState::Closed);
        assert_eq!(result.head_state, HeadState::Normal);
        assert!(result.ear.is_none());
        assert!(result.mar.is_none());
        assert!(result.head_pose.is_none());
    }

    #[test]
    fn test_missing_face_freezes_timers() {
        let mut session = session();

        // 1.0s of closed eyes: below threshold but not yet drowsy
        run_until(&mut session, 0.0, 1.0, drowsy_frame);

        // Face lost for two seconds: the eye timer must not advance
        let result = session.process_frame(&no_face_frame(3.0));
        assert_eq!(result.eye_state, EyeState::Open);

        // Face returns still closed at t=3.1: not instantly drowsy
        let result = session.process_frame(&drowsy_frame(3.1));
        assert_ne!(result.eye_state, EyeState::Open);
        // The original below-threshold start (t=0) was never cleared, so
        // the drowsy deadline is long past once the face returns
        assert_eq!(result.eye_state, EyeState::Drowsy);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = session();
        for i in 0..200 {
            session.process_frame(&calm_frame(i as f64 * 0.033));
        }
        assert_eq!(session.history_len(), HISTORY_CAPACITY);
        assert_eq!(session.recent(10).len(), 10);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = session();
        run_until(&mut session, 0.0, 4.7, drowsy_frame);
        assert!(session.total_alerts() > 0);

        let id = session.id();
        session.reset();
        assert_eq!(session.id(), id, "session id survives a reset");
        assert_eq!(session.total_alerts(), 0);
        assert_eq!(session.history_len(), 0);

        let result = session.process_frame(&drowsy_frame(100.0));
        assert_ne!(
            result.eye_state,
            EyeState::Drowsy,
            "timers restart after reset"
        );
    }

    #[test]
    fn test_summary_counts_levels() {
        let mut session = session();
        run_until(&mut session, 0.0, 1.0, calm_frame);
        let summary = session.summary(60.0);

        assert_eq!(summary.total_detections, session.history_len());
        assert_eq!(summary.critical, 0);
        assert_eq!(summary.latest_state, Some(FatigueState::Awake));
    }

    #[test]
    fn test_export_shape() {
        let mut session = session();
        run_until(&mut session, 0.0, 0.5, calm_frame);

        let export = session.export();
        assert!(export["detection_history"].is_array());
        assert!(export["ear_statistics"]["count"].as_u64().unwrap() > 0);
        assert_eq!(
            export["session_id"].as_str().unwrap(),
            session.id().to_string()
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_at_creation() {
        let mut config = FatigueConfig::default();
        config.head.normal_threshold = 30.0;
        assert!(Session::new(config).is_err());
    }
}
