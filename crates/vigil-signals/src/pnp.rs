//! Iterative perspective-n-point solver.
//!
//! Recovers the rotation and translation that map a small 3-D reference
//! model onto observed 2-D image points under a pinhole camera. The solver
//! runs damped Gauss-Newton over an axis-angle + translation
//! parameterization with numeric Jacobians; six well-spread points converge
//! in a handful of iterations.
//!
//! Failure modes (singular normal equations from degenerate/collinear
//! points, non-convergence, a behind-camera solution) all surface as
//! `None` so the caller can exclude the head signal for the frame.

use nalgebra::{Cholesky, DMatrix, DVector, Matrix3, Vector3, Vector6};

const MAX_ITERATIONS: usize = 50;
const STEP_TOLERANCE: f64 = 1e-8;
const MAX_BACKTRACKS: usize = 8;
/// Points closer than this to the image plane are considered behind the
/// camera.
const MIN_DEPTH: f64 = 1e-6;
/// A converged fit whose RMS reprojection error still exceeds this many
/// pixels means the observations cannot belong to the reference model
/// (degenerate or mislabeled geometry).
const MAX_REPROJECTION_ERROR: f64 = 50.0;

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Camera {
    /// Approximate intrinsics from the frame size: focal length equal to
    /// the frame width, principal point at the frame center, no distortion.
    pub fn approximate(width: u32, height: u32) -> Self {
        Self {
            focal: width as f64,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    /// Project a camera-space point. `None` when the point sits behind the
    /// camera.
    pub fn project(&self, p: &Vector3<f64>) -> Option<(f64, f64)> {
        if p.z < MIN_DEPTH {
            return None;
        }
        Some((
            self.focal * p.x / p.z + self.cx,
            self.focal * p.y / p.z + self.cy,
        ))
    }
}

/// Recovered pose.
#[derive(Debug, Clone)]
pub struct PnpSolution {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels.
    pub reprojection_error: f64,
}

/// Rodrigues formula: axis-angle vector to rotation matrix.
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    let theta = rvec.norm();
    if theta < 1e-12 {
        return Matrix3::identity();
    }
    let axis = rvec / theta;
    let (kx, ky, kz) = (axis.x, axis.y, axis.z);
    let ct = theta.cos();
    let st = theta.sin();
    let vt = 1.0 - ct;

    Matrix3::new(
        ct + kx * kx * vt,
        kx * ky * vt - kz * st,
        kx * kz * vt + ky * st,
        ky * kx * vt + kz * st,
        ct + ky * ky * vt,
        ky * kz * vt - kx * st,
        kz * kx * vt - ky * st,
        kz * ky * vt + kx * st,
        ct + kz * kz * vt,
    )
}

/// Extract (pitch, yaw, roll) in degrees from a rotation matrix.
///
/// Standard three-axis extraction; near gimbal lock (the `sy` norm close
/// to zero) the alternate two-angle formula is used and roll is reported
/// as zero.
pub fn euler_angles_degrees(r: &Matrix3<f64>) -> (f64, f64, f64) {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (x, y, z) = if sy >= 1e-6 {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    } else {
        (
            (-r[(1, 2)]).atan2(r[(1, 1)]),
            (-r[(2, 0)]).atan2(sy),
            0.0,
        )
    };

    (x.to_degrees(), y.to_degrees(), z.to_degrees())
}

/// Solve for the pose mapping `model` points onto `image` observations.
///
/// `model` and `image` must be the same length, at least four points.
pub fn solve(model: &[Vector3<f64>], image: &[(f64, f64)], camera: &Camera) -> Option<PnpSolution> {
    if model.len() != image.len() || model.len() < 4 {
        return None;
    }

    // Start frontal, comfortably in front of the camera relative to the
    // model scale.
    let scale = model.iter().map(|p| p.norm()).fold(0.0, f64::max).max(1.0);
    let mut params = Vector6::new(0.0, 0.0, 0.0, 0.0, 0.0, scale * 3.0);

    let mut residuals = residual_vector(&params, model, image, camera)?;
    let mut error = residuals.norm_squared();
    let mut last_step = f64::INFINITY;

    for _ in 0..MAX_ITERATIONS {
        let jacobian = numeric_jacobian(&params, model, image, camera)?;
        let jt = jacobian.transpose();
        let normal = &jt * &jacobian;
        let gradient = &jt * &residuals;

        // Singular normal equations: degenerate or collinear model geometry
        let chol = Cholesky::new(normal)?;
        let step = chol.solve(&gradient);
        last_step = step.norm();

        // Backtracking line search: shrink the step until the error drops
        let mut accepted = false;
        let mut damping = 1.0;
        for _ in 0..MAX_BACKTRACKS {
            let mut candidate = params;
            for k in 0..6 {
                candidate[k] -= damping * step[k];
            }
            if let Some(r) = residual_vector(&candidate, model, image, camera) {
                let e = r.norm_squared();
                if e < error {
                    params = candidate;
                    residuals = r;
                    error = e;
                    accepted = true;
                    break;
                }
            }
            damping *= 0.5;
        }

        if !accepted || last_step < STEP_TOLERANCE {
            break;
        }
    }

    let rms = (error / image.len() as f64).sqrt();
    let converged = last_step < 1e-3 || rms < 1e-6;
    if !converged || rms > MAX_REPROJECTION_ERROR {
        return None;
    }

    let translation = Vector3::new(params[3], params[4], params[5]);
    if translation.z < MIN_DEPTH {
        return None;
    }

    Some(PnpSolution {
        rotation: rodrigues(&Vector3::new(params[0], params[1], params[2])),
        translation,
        reprojection_error: rms,
    })
}

fn residual_vector(
    params: &Vector6<f64>,
    model: &[Vector3<f64>],
    image: &[(f64, f64)],
    camera: &Camera,
) -> Option<DVector<f64>> {
    let rotation = rodrigues(&Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);

    let mut residuals = DVector::zeros(2 * model.len());
    for (i, (point, observed)) in model.iter().zip(image.iter()).enumerate() {
        let transformed = rotation * point + translation;
        let (u, v) = camera.project(&transformed)?;
        residuals[2 * i] = u - observed.0;
        residuals[2 * i + 1] = v - observed.1;
    }
    Some(residuals)
}

fn numeric_jacobian(
    params: &Vector6<f64>,
    model: &[Vector3<f64>],
    image: &[(f64, f64)],
    camera: &Camera,
) -> Option<DMatrix<f64>> {
    let mut jacobian = DMatrix::zeros(2 * model.len(), 6);
    for k in 0..6 {
        let h = 1e-6 * (1.0 + params[k].abs());
        let mut plus = *params;
        let mut minus = *params;
        plus[k] += h;
        minus[k] -= h;

        let r_plus = residual_vector(&plus, model, image, camera)?;
        let r_minus = residual_vector(&minus, model, image, camera)?;
        for row in 0..2 * model.len() {
            jacobian[(row, k)] = (r_plus[row] - r_minus[row]) / (2.0 * h);
        }
    }
    Some(jacobian)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_model() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 330.0, 65.0),
            Vector3::new(-225.0, -170.0, 135.0),
            Vector3::new(225.0, -170.0, 135.0),
            Vector3::new(-150.0, 150.0, 125.0),
            Vector3::new(150.0, 150.0, 125.0),
        ]
    }

    fn project_with(
        model: &[Vector3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        camera: &Camera,
    ) -> Vec<(f64, f64)> {
        let r = rodrigues(rvec);
        model
            .iter()
            .map(|p| camera.project(&(r * p + tvec)).expect("in front of camera"))
            .collect()
    }

    #[test]
    fn test_recovers_frontal_pose() {
        let camera = Camera::approximate(640, 480);
        let model = reference_model();
        let image = project_with(
            &model,
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 1200.0),
            &camera,
        );

        let solution = solve(&model, &image, &camera).expect("solver converges");
        let (pitch, yaw, roll) = euler_angles_degrees(&solution.rotation);
        assert!(pitch.abs() < 0.1, "pitch {}", pitch);
        assert!(yaw.abs() < 0.1, "yaw {}", yaw);
        assert!(roll.abs() < 0.1, "roll {}", roll);
        assert!(solution.reprojection_error < 0.5);
    }

    #[test]
    fn test_recovers_pitched_pose() {
        let camera = Camera::approximate(640, 480);
        let model = reference_model();
        let rvec = Vector3::new(0.3, 0.0, 0.0); // ~17.19 degrees nod
        let image = project_with(&model, &rvec, &Vector3::new(20.0, -40.0, 1000.0), &camera);

        let solution = solve(&model, &image, &camera).expect("solver converges");
        let (pitch, yaw, roll) = euler_angles_degrees(&solution.rotation);
        assert!((pitch - 0.3_f64.to_degrees()).abs() < 0.5, "pitch {}", pitch);
        assert!(yaw.abs() < 0.5, "yaw {}", yaw);
        assert!(roll.abs() < 0.5, "roll {}", roll);
    }

    #[test]
    fn test_collinear_model_fails_gracefully() {
        let camera = Camera::approximate(640, 480);
        // A collinear reference model leaves rotation about its axis
        // unobservable; the singular normal equations must surface as None
        let model: Vec<Vector3<f64>> = (0..6)
            .map(|i| Vector3::new(50.0 * i as f64, 0.0, 0.0))
            .collect();
        let image: Vec<(f64, f64)> = (0..6).map(|i| (100.0 + 30.0 * i as f64, 240.0)).collect();

        assert!(solve(&model, &image, &camera).is_none());
    }

    #[test]
    fn test_too_few_points_rejected() {
        let camera = Camera::approximate(640, 480);
        let model = reference_model();
        assert!(solve(&model[..3], &[(0.0, 0.0); 3], &camera).is_none());
    }

    #[test]
    fn test_euler_gimbal_lock_branch() {
        // Rotation of 90 degrees about y puts sy at zero
        let r = rodrigues(&Vector3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0));
        let (pitch, yaw, roll) = euler_angles_degrees(&r);
        assert!(pitch.is_finite() && yaw.is_finite());
        assert_eq!(roll, 0.0, "roll pinned to zero in the singular case");
        assert!((yaw - 90.0).abs() < 1e-6, "yaw {}", yaw);
    }

    #[test]
    fn test_rodrigues_identity_for_zero_vector() {
        let r = rodrigues(&Vector3::zeros());
        assert!((r - Matrix3::identity()).norm() < 1e-12);
    }
}
