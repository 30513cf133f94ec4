//! Head pose estimation and head-state classification.
//!
//! Six labeled 2-D points (nose tip, estimated chin, outer eye corners,
//! mouth corners) are matched against a canonical 3-D face model and solved
//! for rotation with the iterative PnP solver. The model is expressed in
//! camera coordinates (x right, y down, z away from the camera) so a
//! frontal face decomposes to near-zero Euler angles.
//!
//! Any failure along the way (missing regions, degenerate geometry, solver
//! non-convergence) yields "no pose available" and the head signal is
//! excluded from fusion for that frame.

use nalgebra::Vector3;
use tracing::debug;

use vigil_models::config::HeadPoseConfig;
use vigil_models::detection::HeadPose;
use vigil_models::landmarks::FaceRegions;
use vigil_models::states::HeadState;

use crate::pnp::{self, Camera};
use crate::stats::{RollingWindow, WindowStats};

const HISTORY_CAPACITY: usize = 30;

/// Canonical 3-D face model, in camera coordinates, millimeter-ish units.
///
/// Order: nose tip, chin, left eye outer corner, right eye outer corner,
/// left mouth corner, right mouth corner.
const MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, 330.0, 65.0],
    [-225.0, -170.0, 135.0],
    [225.0, -170.0, 135.0],
    [-150.0, 150.0, 125.0],
    [150.0, 150.0, 125.0],
];

/// Stateless pose estimator for a fixed frame size.
#[derive(Debug, Clone)]
pub struct HeadPoseEstimator {
    camera: Camera,
    model: Vec<Vector3<f64>>,
}

impl HeadPoseEstimator {
    /// Build an estimator with approximate pinhole intrinsics for the
    /// given frame size.
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        Self {
            camera: Camera::approximate(frame_width, frame_height),
            model: MODEL_POINTS
                .iter()
                .map(|p| Vector3::new(p[0], p[1], p[2]))
                .collect(),
        }
    }

    /// Estimate the head pose from this frame's regions.
    ///
    /// Returns `None` when any required region is absent or the solver
    /// cannot produce a pose.
    pub fn estimate(&self, regions: &FaceRegions) -> Option<HeadPose> {
        let image = image_points(regions)?;
        let solution = match pnp::solve(&self.model, &image, &self.camera) {
            Some(s) => s,
            None => {
                debug!("head pose solver did not converge; skipping frame");
                return None;
            }
        };

        let (pitch, yaw, roll) = pnp::euler_angles_degrees(&solution.rotation);
        Some(HeadPose::new(pitch, yaw, roll))
    }
}

/// Pick the six 2-D correspondence points out of the extracted regions.
///
/// The chin is estimated as the lowest face-outline point, the eye corners
/// are the first/fourth eye points (outer corners), the mouth corners the
/// first/fourth mouth points.
fn image_points(regions: &FaceRegions) -> Option<Vec<(f64, f64)>> {
    let nose = regions.nose.as_ref()?;
    let outline = regions.face_outline.as_ref()?;
    let left_eye = regions.left_eye.as_ref()?;
    let right_eye = regions.right_eye.as_ref()?;
    let mouth = regions.mouth.as_ref()?;

    let nose_tip = nose.first()?;
    let chin = outline
        .iter()
        .max_by(|a, b| a.y.total_cmp(&b.y))?;

    Some(vec![
        (nose_tip.x, nose_tip.y),
        (chin.x, chin.y),
        (left_eye[0].x, left_eye[0].y),
        (right_eye[3].x, right_eye[3].y),
        (mouth[0].x, mouth[0].y),
        (mouth[3].x, mouth[3].y),
    ])
}

/// Stateful head classifier over the pitch magnitude.
#[derive(Debug)]
pub struct HeadTracker {
    config: HeadPoseConfig,
    drowsy_start: Option<f64>,
    history: RollingWindow,
}

impl HeadTracker {
    pub fn new(config: HeadPoseConfig) -> Self {
        Self {
            config,
            drowsy_start: None,
            history: RollingWindow::new(HISTORY_CAPACITY),
        }
    }

    /// Feed one frame's recovered pose. Returns the classified state.
    pub fn update(&mut self, pose: &HeadPose, timestamp: f64) -> HeadState {
        self.history.push(pose.pitch);
        let abs_pitch = pose.abs_pitch();

        if abs_pitch > self.config.drowsy_threshold {
            self.drowsy_start.get_or_insert(timestamp);
        } else {
            self.drowsy_start = None;
        }

        if let Some(start) = self.drowsy_start {
            if timestamp - start >= self.config.drowsy_duration {
                return HeadState::HeadDownDrowsy;
            }
        }
        if abs_pitch > self.config.drowsy_threshold {
            HeadState::Tilted
        } else if abs_pitch > self.config.normal_threshold {
            HeadState::SlightlyTilted
        } else {
            HeadState::Normal
        }
    }

    /// Statistics over the recent pitch history.
    pub fn statistics(&self) -> WindowStats {
        self.history.stats()
    }

    /// Clear all per-session state.
    pub fn reset(&mut self) {
        self.drowsy_start = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnp::rodrigues;
    use vigil_models::geometry::Point;
    use vigil_models::landmarks::{LabeledPoint, RegionLabel};

    /// Project the reference model under a known rotation and scatter the
    /// points into provider-style labeled regions.
    fn synthetic_regions(rvec: Vector3<f64>) -> FaceRegions {
        let camera = Camera::approximate(640, 480);
        let rotation = rodrigues(&rvec);
        let translation = Vector3::new(0.0, 0.0, 1100.0);

        let projected: Vec<(f64, f64)> = MODEL_POINTS
            .iter()
            .map(|p| {
                let v = rotation * Vector3::new(p[0], p[1], p[2]) + translation;
                camera.project(&v).expect("in front of camera")
            })
            .collect();

        let pt = |i: usize| Point::new(projected[i].0, projected[i].1, 0.0);
        let filler = |x: f64, y: f64| Point::new(x, y, 0.0);

        let mut labeled = Vec::new();
        // Left eye: outer corner first, rest filler lid points
        labeled.push(LabeledPoint::new(RegionLabel::LeftEye, pt(2)));
        for i in 0..5 {
            labeled.push(LabeledPoint::new(
                RegionLabel::LeftEye,
                filler(projected[2].0 + 4.0 + i as f64, projected[2].1),
            ));
        }
        // Right eye: outer corner is the fourth point
        for i in 0..3 {
            labeled.push(LabeledPoint::new(
                RegionLabel::RightEye,
                filler(projected[3].0 - 12.0 + i as f64, projected[3].1),
            ));
        }
        labeled.push(LabeledPoint::new(RegionLabel::RightEye, pt(3)));
        for i in 0..2 {
            labeled.push(LabeledPoint::new(
                RegionLabel::RightEye,
                filler(projected[3].0 - 8.0 + i as f64, projected[3].1 + 2.0),
            ));
        }
        // Mouth: corners at positions 0 and 3
        labeled.push(LabeledPoint::new(RegionLabel::Mouth, pt(4)));
        labeled.push(LabeledPoint::new(
            RegionLabel::Mouth,
            filler(projected[4].0 + 10.0, projected[4].1 - 3.0),
        ));
        labeled.push(LabeledPoint::new(
            RegionLabel::Mouth,
            filler(projected[5].0 - 10.0, projected[5].1 - 3.0),
        ));
        labeled.push(LabeledPoint::new(RegionLabel::Mouth, pt(5)));
        labeled.push(LabeledPoint::new(
            RegionLabel::Mouth,
            filler(projected[5].0 - 10.0, projected[5].1 + 3.0),
        ));
        labeled.push(LabeledPoint::new(
            RegionLabel::Mouth,
            filler(projected[4].0 + 10.0, projected[4].1 + 3.0),
        ));
        // Nose tip
        labeled.push(LabeledPoint::new(RegionLabel::Nose, pt(0)));
        // Face outline: the chin projection is the lowest point
        labeled.push(LabeledPoint::new(
            RegionLabel::FaceOutline,
            filler(projected[1].0 - 60.0, projected[1].1 - 80.0),
        ));
        labeled.push(LabeledPoint::new(
            RegionLabel::FaceOutline,
            filler(projected[1].0 + 60.0, projected[1].1 - 80.0),
        ));
        labeled.push(LabeledPoint::new(RegionLabel::FaceOutline, pt(1)));
        labeled.push(LabeledPoint::new(
            RegionLabel::FaceOutline,
            filler(projected[1].0, projected[1].1 - 160.0),
        ));

        FaceRegions::from_labeled(&labeled)
    }

    #[test]
    fn test_frontal_face_is_near_zero() {
        let estimator = HeadPoseEstimator::new(640, 480);
        let regions = synthetic_regions(Vector3::zeros());
        let pose = estimator.estimate(&regions).expect("pose available");
        assert!(pose.pitch.abs() < 1.0, "pitch {}", pose.pitch);
        assert!(pose.yaw.abs() < 1.0, "yaw {}", pose.yaw);
    }

    #[test]
    fn test_nodding_face_recovers_pitch() {
        let estimator = HeadPoseEstimator::new(640, 480);
        let rvec = Vector3::new(0.35, 0.0, 0.0); // ~20 degrees
        let regions = synthetic_regions(rvec);
        let pose = estimator.estimate(&regions).expect("pose available");
        assert!(
            (pose.pitch - 0.35_f64.to_degrees()).abs() < 1.0,
            "pitch {}",
            pose.pitch
        );
    }

    #[test]
    fn test_missing_region_means_no_pose() {
        let estimator = HeadPoseEstimator::new(640, 480);
        let mut regions = synthetic_regions(Vector3::zeros());
        regions.nose = None;
        assert!(estimator.estimate(&regions).is_none());
    }

    #[test]
    fn test_head_drowsy_only_after_duration() {
        let config = HeadPoseConfig {
            normal_threshold: 10.0,
            drowsy_threshold: 15.0,
            drowsy_duration: 1.5,
        };
        let mut tracker = HeadTracker::new(config);
        let nodding = HeadPose::new(18.0, 0.0, 0.0);

        let mut t = 0.0;
        let mut state = HeadState::Normal;
        while t < 1.5 - 1e-9 {
            state = tracker.update(&nodding, t);
            t += 0.05;
        }
        assert_eq!(state, HeadState::Tilted, "not yet sustained");

        let state = tracker.update(&nodding, 1.5);
        assert_eq!(state, HeadState::HeadDownDrowsy);
    }

    #[test]
    fn test_mild_tilt_states() {
        let mut tracker = HeadTracker::new(HeadPoseConfig::default());
        assert_eq!(
            tracker.update(&HeadPose::new(5.0, 0.0, 0.0), 0.0),
            HeadState::Normal
        );
        assert_eq!(
            tracker.update(&HeadPose::new(-12.0, 0.0, 0.0), 0.1),
            HeadState::SlightlyTilted
        );
        assert_eq!(
            tracker.update(&HeadPose::new(-16.0, 0.0, 0.0), 0.2),
            HeadState::Tilted
        );
    }

    #[test]
    fn test_recovery_clears_timer() {
        let config = HeadPoseConfig {
            normal_threshold: 10.0,
            drowsy_threshold: 15.0,
            drowsy_duration: 1.0,
        };
        let mut tracker = HeadTracker::new(config);
        let nodding = HeadPose::new(20.0, 0.0, 0.0);
        let level = HeadPose::new(2.0, 0.0, 0.0);

        tracker.update(&nodding, 0.0);
        tracker.update(&nodding, 0.9);
        // Head comes back up just before the deadline
        tracker.update(&level, 0.95);
        // Nods again: the timer must restart
        let state = tracker.update(&nodding, 1.0);
        assert_eq!(state, HeadState::Tilted);
        let state = tracker.update(&nodding, 1.9);
        assert_eq!(state, HeadState::Tilted);
        let state = tracker.update(&nodding, 2.0);
        assert_eq!(state, HeadState::HeadDownDrowsy);
    }
}
