//! Landmark frames and facial region extraction.
//!
//! The external landmark provider hands back a flat list of labeled 3-D
//! points. This module groups them into the fixed-size regions the signal
//! extractors consume. A region with too few points is treated as "signal
//! unavailable" for that frame, never as an error.
//!
//! # Region point ordering
//!
//! - Eyes (6 points): outer corner, two upper lid points, inner corner,
//!   two lower lid points, the ordering the EAR formula expects.
//! - Mouth (6 points): left corner, top left, top right, right corner,
//!   bottom right, bottom left, the ordering the MAR formula expects.
//! - Nose: at least one point; the first is the nose tip.
//! - Face outline: at least four boundary points; the lowest one stands in
//!   for the chin during pose estimation.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Number of points per eye region.
pub const EYE_POINTS: usize = 6;
/// Number of points in the mouth region.
pub const MOUTH_POINTS: usize = 6;
/// Minimum number of face-outline points required for pose estimation.
pub const MIN_OUTLINE_POINTS: usize = 4;

/// Facial region a landmark point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionLabel {
    LeftEye,
    RightEye,
    Mouth,
    Nose,
    FaceOutline,
}

/// A landmark point tagged with the region it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub label: RegionLabel,
    pub point: Point,
}

impl LabeledPoint {
    pub fn new(label: RegionLabel, point: Point) -> Self {
        Self { label, point }
    }
}

/// The facial regions extracted from one frame's landmark list.
///
/// Each field is `None` when the provider did not return enough points for
/// that region; downstream classifiers skip absent signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceRegions {
    pub left_eye: Option<[Point; EYE_POINTS]>,
    pub right_eye: Option<[Point; EYE_POINTS]>,
    pub mouth: Option<[Point; MOUTH_POINTS]>,
    pub nose: Option<Vec<Point>>,
    pub face_outline: Option<Vec<Point>>,
}

impl FaceRegions {
    /// Group a provider's labeled point list into regions.
    ///
    /// Points are taken in arrival order within each label; extra points
    /// beyond a region's required count are ignored.
    pub fn from_labeled(points: &[LabeledPoint]) -> Self {
        let mut left_eye = Vec::with_capacity(EYE_POINTS);
        let mut right_eye = Vec::with_capacity(EYE_POINTS);
        let mut mouth = Vec::with_capacity(MOUTH_POINTS);
        let mut nose = Vec::new();
        let mut face_outline = Vec::new();

        for lp in points {
            match lp.label {
                RegionLabel::LeftEye => left_eye.push(lp.point),
                RegionLabel::RightEye => right_eye.push(lp.point),
                RegionLabel::Mouth => mouth.push(lp.point),
                RegionLabel::Nose => nose.push(lp.point),
                RegionLabel::FaceOutline => face_outline.push(lp.point),
            }
        }

        Self {
            left_eye: fixed_region(&left_eye),
            right_eye: fixed_region(&right_eye),
            mouth: fixed_region(&mouth),
            nose: (!nose.is_empty()).then_some(nose),
            face_outline: (face_outline.len() >= MIN_OUTLINE_POINTS).then_some(face_outline),
        }
    }

    /// Whether any region at all was extracted.
    pub fn has_any(&self) -> bool {
        self.left_eye.is_some()
            || self.right_eye.is_some()
            || self.mouth.is_some()
            || self.nose.is_some()
            || self.face_outline.is_some()
    }

    /// Whether both eye regions are present.
    pub fn has_eyes(&self) -> bool {
        self.left_eye.is_some() && self.right_eye.is_some()
    }

    /// Whether every region needed for pose estimation is present.
    pub fn has_pose_points(&self) -> bool {
        self.nose.is_some() && self.face_outline.is_some() && self.has_eyes() && self.mouth.is_some()
    }
}

fn fixed_region<const N: usize>(points: &[Point]) -> Option<[Point; N]> {
    if points.len() < N {
        return None;
    }
    let mut region = [Point::default(); N];
    region.copy_from_slice(&points[..N]);
    Some(region)
}

/// One frame's worth of landmarks, as consumed by the detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture timestamp in seconds (monotonic within a session).
    pub timestamp: f64,
    /// Source frame width in pixels.
    pub width: u32,
    /// Source frame height in pixels.
    pub height: u32,
    /// Extracted facial regions.
    pub regions: FaceRegions,
}

impl LandmarkFrame {
    /// Build a frame from the provider's labeled point list.
    ///
    /// An empty list yields a frame with no regions ("no face detected").
    pub fn from_labeled(timestamp: f64, width: u32, height: u32, points: &[LabeledPoint]) -> Self {
        Self {
            timestamp,
            width,
            height,
            regions: FaceRegions::from_labeled(points),
        }
    }

    /// Whether the provider found a face in this frame.
    pub fn has_face(&self) -> bool {
        self.regions.has_any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(label: RegionLabel, n: usize) -> Vec<LabeledPoint> {
        (0..n)
            .map(|i| LabeledPoint::new(label, Point::new(i as f64, i as f64, 0.0)))
            .collect()
    }

    #[test]
    fn test_full_region_set_extracts() {
        let mut points = labeled(RegionLabel::LeftEye, 6);
        points.extend(labeled(RegionLabel::RightEye, 6));
        points.extend(labeled(RegionLabel::Mouth, 6));
        points.extend(labeled(RegionLabel::Nose, 1));
        points.extend(labeled(RegionLabel::FaceOutline, 4));

        let regions = FaceRegions::from_labeled(&points);
        assert!(regions.has_eyes());
        assert!(regions.has_pose_points());
    }

    #[test]
    fn test_short_region_is_absent() {
        // 5 eye points is not enough for the EAR formula
        let points = labeled(RegionLabel::LeftEye, 5);
        let regions = FaceRegions::from_labeled(&points);
        assert!(regions.left_eye.is_none());
        assert!(!regions.has_any());
    }

    #[test]
    fn test_extra_points_are_ignored() {
        let points = labeled(RegionLabel::Mouth, 9);
        let regions = FaceRegions::from_labeled(&points);
        let mouth = regions.mouth.expect("mouth region");
        assert_eq!(mouth[5], Point::new(5.0, 5.0, 0.0));
    }

    #[test]
    fn test_empty_list_means_no_face() {
        let frame = LandmarkFrame::from_labeled(0.0, 640, 480, &[]);
        assert!(!frame.has_face());
    }

    #[test]
    fn test_outline_needs_four_points() {
        let points = labeled(RegionLabel::FaceOutline, 3);
        let regions = FaceRegions::from_labeled(&points);
        assert!(regions.face_outline.is_none());
    }
}
