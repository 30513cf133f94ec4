//! External collaborator interfaces.
//!
//! Camera I/O, the landmark model, alert playback, history persistence,
//! and on-screen rendering are all outside this engine; the traits here
//! are the seams they plug into. Synthetic implementations are provided
//! for the integration tests and the `vigil-monitor` selfcheck run.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use vigil_models::detection::DetectionResult;
use vigil_models::geometry::Point;
use vigil_models::landmarks::{LabeledPoint, RegionLabel};
use vigil_models::states::AlertLevel;

use crate::metrics::MetricsSnapshot;

/// One frame pulled from the camera collaborator.
///
/// The pixel payload is opaque to the engine; it is only handed to the
/// landmark provider and (optionally) the presenter.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Capture timestamp in seconds (monotonic within a session).
    pub timestamp: f64,
    /// Monotonic frame counter.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<Vec<u8>>,
}

/// Camera/frame source. `poll` must be non-blocking and is called at most
/// once per acquisition loop iteration.
pub trait FrameSource: Send {
    fn poll(&mut self) -> Option<CapturedFrame>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str {
        "frame-source"
    }
}

/// Facial landmark provider. An empty list means no face was found.
pub trait LandmarkProvider: Send {
    fn detect(&mut self, frame: &CapturedFrame) -> Vec<LabeledPoint>;

    fn name(&self) -> &'static str {
        "landmark-provider"
    }
}

/// An alert-level transition or repeat that survived debouncing.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub timestamp: f64,
    pub previous: AlertLevel,
    pub level: AlertLevel,
    pub confidence: f64,
    pub contributing_factors: Vec<String>,
    pub recommendation: String,
}

/// Receives debounced alert events (audio playback, haptics, telemetry).
pub trait AlertSink: Send {
    fn on_alert(&mut self, event: &AlertEvent);
}

/// Receives every detection result for append-only storage.
pub trait HistorySink: Send {
    fn on_result(&mut self, result: &DetectionResult);
}

/// What the detection stage published for one frame.
#[derive(Debug, Clone)]
pub enum DetectionUpdate {
    Result(DetectionResult),
    /// The provider returned no usable landmarks for this frame.
    NoFace { timestamp: f64 },
}

/// Payload handed to the presenter each render cycle.
#[derive(Debug, Clone)]
pub struct PresentationUpdate {
    pub detection: DetectionUpdate,
    pub metrics: MetricsSnapshot,
}

/// Commands the presentation stage accepts from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    Quit,
    Reset,
    Snapshot,
}

/// Renders the latest result and pipeline metrics.
pub trait Presenter: Send {
    fn render(&mut self, update: &PresentationUpdate);

    /// Persist the current view on a snapshot command. Default: no-op.
    fn snapshot(&mut self, update: Option<&PresentationUpdate>) {
        let _ = update;
    }

    fn name(&self) -> &'static str {
        "presenter"
    }
}

/// Clock-free frame source producing empty frames at a scripted rate.
///
/// Timestamps advance by `1 / fps` per frame, so simulated time tracks the
/// acquisition throttle without touching a wall clock.
#[derive(Debug)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    fps: f64,
    sequence: u64,
    pixels: Arc<Vec<u8>>,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            sequence: 0,
            pixels: Arc::new(Vec::new()),
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn poll(&mut self) -> Option<CapturedFrame> {
        let frame = CapturedFrame {
            timestamp: self.sequence as f64 / self.fps,
            sequence: self.sequence,
            width: self.width,
            height: self.height,
            pixels: Arc::clone(&self.pixels),
        };
        self.sequence += 1;
        Some(frame)
    }

    fn name(&self) -> &'static str {
        "synthetic-camera"
    }
}

/// Landmark provider driven by a timestamp-indexed script.
pub struct ScriptedLandmarkProvider {
    script: Box<dyn FnMut(f64) -> Vec<LabeledPoint> + Send>,
}

impl ScriptedLandmarkProvider {
    pub fn new(script: impl FnMut(f64) -> Vec<LabeledPoint> + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
        }
    }
}

impl LandmarkProvider for ScriptedLandmarkProvider {
    fn detect(&mut self, frame: &CapturedFrame) -> Vec<LabeledPoint> {
        (self.script)(frame.timestamp)
    }

    fn name(&self) -> &'static str {
        "scripted-landmarks"
    }
}

/// Build a plausible frontal face for a 640x480 frame.
///
/// `eye_opening` and `mouth_opening` are vertical extents in pixels; with
/// the geometry used here EAR is `eye_opening / 60` and MAR is
/// `mouth_opening / 80`.
pub fn synthetic_face(eye_opening: f64, mouth_opening: f64) -> Vec<LabeledPoint> {
    let eye = |cx: f64, cy: f64| {
        let half = 30.0;
        [
            Point::new(cx - half, cy, 0.0),
            Point::new(cx - half / 3.0, cy - eye_opening / 2.0, 0.0),
            Point::new(cx + half / 3.0, cy - eye_opening / 2.0, 0.0),
            Point::new(cx + half, cy, 0.0),
            Point::new(cx + half / 3.0, cy + eye_opening / 2.0, 0.0),
            Point::new(cx - half / 3.0, cy + eye_opening / 2.0, 0.0),
        ]
    };
    let mouth = {
        let (cx, cy, half) = (320.0, 330.0, 40.0);
        [
            Point::new(cx - half, cy, 0.0),
            Point::new(cx - half / 2.0, cy - mouth_opening / 2.0, 0.0),
            Point::new(cx + half / 2.0, cy - mouth_opening / 2.0, 0.0),
            Point::new(cx + half, cy, 0.0),
            Point::new(cx + half / 2.0, cy + mouth_opening / 2.0, 0.0),
            Point::new(cx - half / 2.0, cy + mouth_opening / 2.0, 0.0),
        ]
    };

    let mut points = Vec::with_capacity(18);
    for p in eye(250.0, 200.0) {
        points.push(LabeledPoint::new(RegionLabel::LeftEye, p));
    }
    for p in eye(390.0, 200.0) {
        points.push(LabeledPoint::new(RegionLabel::RightEye, p));
    }
    for p in mouth {
        points.push(LabeledPoint::new(RegionLabel::Mouth, p));
    }
    points.push(LabeledPoint::new(
        RegionLabel::Nose,
        Point::new(320.0, 260.0, 0.0),
    ));
    for p in [
        Point::new(240.0, 150.0, 0.0),
        Point::new(400.0, 150.0, 0.0),
        Point::new(320.0, 120.0, 0.0),
        Point::new(320.0, 430.0, 0.0), // chin: lowest outline point
    ] {
        points.push(LabeledPoint::new(RegionLabel::FaceOutline, p));
    }
    points
}

/// Relaxed face: eyes open, mouth closed.
pub fn calm_face() -> Vec<LabeledPoint> {
    synthetic_face(18.0, 8.0) // EAR 0.30, MAR 0.10
}

/// Fatigued face: eyes nearly shut, mouth wide open.
pub fn drowsy_face() -> Vec<LabeledPoint> {
    synthetic_face(7.0, 64.0) // EAR 0.12, MAR 0.80
}

/// Alert sink that logs through `tracing`.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn on_alert(&mut self, event: &AlertEvent) {
        warn!(
            level = %event.level,
            confidence = event.confidence,
            factors = ?event.contributing_factors,
            "{}",
            event.recommendation
        );
    }
}

/// Presenter that logs state transitions and a periodic status line.
#[derive(Debug)]
pub struct ConsolePresenter {
    last_level: Option<AlertLevel>,
    last_status: Instant,
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self {
            last_level: None,
            last_status: Instant::now(),
        }
    }
}

impl Presenter for ConsolePresenter {
    fn render(&mut self, update: &PresentationUpdate) {
        match &update.detection {
            DetectionUpdate::Result(result) => {
                if self.last_level != Some(result.alert_level) {
                    info!(
                        level = %result.alert_level,
                        ear = ?result.ear,
                        mar = ?result.mar,
                        "state changed: {}",
                        result.recommendation
                    );
                    self.last_level = Some(result.alert_level);
                }
            }
            DetectionUpdate::NoFace { .. } => {
                if self.last_level.is_some() {
                    info!("no face detected");
                    self.last_level = None;
                }
            }
        }

        if self.last_status.elapsed().as_secs() >= 5 {
            let m = &update.metrics;
            info!(
                capture_fps = m.capture_fps,
                processing_fps = m.processing_fps,
                dropped = m.dropped_frames,
                faces = m.faces_detected,
                "pipeline status"
            );
            self.last_status = Instant::now();
        }
    }

    fn snapshot(&mut self, update: Option<&PresentationUpdate>) {
        match update.map(|u| serde_json::to_string(&u.metrics)) {
            Some(Ok(json)) => info!(metrics = %json, "snapshot"),
            _ => info!("snapshot requested with nothing to show"),
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::landmarks::LandmarkFrame;

    #[test]
    fn test_synthetic_face_regions_are_complete() {
        let frame = LandmarkFrame::from_labeled(0.0, 640, 480, &calm_face());
        assert!(frame.has_face());
        assert!(frame.regions.has_eyes());
        assert!(frame.regions.has_pose_points());
    }

    #[test]
    fn test_synthetic_face_hits_requested_ratios() {
        use vigil_signals::{combined_ear, mouth_aspect_ratio};

        let frame = LandmarkFrame::from_labeled(0.0, 640, 480, &drowsy_face());
        let regions = &frame.regions;
        let ear = combined_ear(
            regions.left_eye.as_ref().unwrap(),
            regions.right_eye.as_ref().unwrap(),
        );
        let mar = mouth_aspect_ratio(regions.mouth.as_ref().unwrap());

        assert!((ear - 7.0 / 60.0).abs() < 1e-9, "ear {}", ear);
        assert!((mar - 0.8).abs() < 1e-9, "mar {}", mar);
    }

    #[test]
    fn test_synthetic_source_timestamps_advance() {
        let mut source = SyntheticFrameSource::new(640, 480, 30.0);
        let a = source.poll().unwrap();
        let b = source.poll().unwrap();
        assert_eq!(a.sequence, 0);
        assert!((b.timestamp - a.timestamp - 1.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_scripted_provider_uses_frame_time() {
        let mut provider =
            ScriptedLandmarkProvider::new(|t| if t < 1.0 { Vec::new() } else { calm_face() });
        let mut source = SyntheticFrameSource::new(640, 480, 1.0);
        let first = source.poll().unwrap();
        let second = source.poll().unwrap();
        assert!(provider.detect(&first).is_empty());
        assert!(!provider.detect(&second).is_empty());
    }
}
