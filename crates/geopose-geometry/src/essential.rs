use serde::{Deserialize, Serialize};

use crate::linalg::{self, Mat33, NormalEquations9, Vec3};
use crate::triangulation;

/// Errors of the essential matrix estimator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EssentialError {
    /// Fewer than eight points were given.
    #[error("At least 8 points are required, got {0}")]
    NotEnoughPoints(usize),

    /// The two point sets have different lengths.
    #[error("Point sets have different lengths: {0} vs {1}")]
    MismatchedLengths(usize, usize),

    /// The points do not constrain a unique essential matrix (e.g. a planar scene).
    #[error("Degenerate point configuration")]
    Degenerate,
}

/// Tag of one of the four algebraic solutions of an essential matrix decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    /// `R = U W V^T`, `t = u3`.
    RotationAPositive,
    /// `R = U W V^T`, `t = -u3`.
    RotationANegative,
    /// `R = U W^T V^T`, `t = u3`.
    RotationBPositive,
    /// `R = U W^T V^T`, `t = -u3`.
    RotationBNegative,
}

/// A candidate relative pose `x2 = R * x1 + t` with unit-norm translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseCandidate {
    /// Which algebraic solution this is.
    pub kind: CandidateKind,
    /// Rotation from the first to the second camera frame.
    pub rotation: Mat33,
    /// Translation direction from the first to the second camera frame.
    pub translation: Vec3,
}

/// Estimate the essential matrix with the normalized 8-point algorithm.
///
/// - `x1`: normalized camera coordinates in view 1 (length >= 8)
/// - `x2`: corresponding normalized camera coordinates in view 2
///
/// The result satisfies `x2^T E x1 = 0` and has singular values `(1, 1, 0)`.
pub fn essential_8point(x1: &[[f64; 2]], x2: &[[f64; 2]]) -> Result<Mat33, EssentialError> {
    if x1.len() != x2.len() {
        return Err(EssentialError::MismatchedLengths(x1.len(), x2.len()));
    }
    if x1.len() < 8 {
        return Err(EssentialError::NotEnoughPoints(x1.len()));
    }

    let (x1n, t1) = linalg::normalize_points_2d(x1);
    let (x2n, t2) = linalg::normalize_points_2d(x2);

    let mut neq = NormalEquations9::default();
    for (p, q) in x1n.iter().zip(x2n.iter()) {
        let (x, y) = (p[0], p[1]);
        let (xp, yp) = (q[0], q[1]);
        neq.add_row(&[xp * x, xp * y, xp, yp * x, yp * y, yp, x, y, 1.0]);
    }

    let e = neq.null_vector().ok_or(EssentialError::Degenerate)?;
    let en = [[e[0], e[1], e[2]], [e[3], e[4], e[5]], [e[6], e[7], e[8]]];

    // denormalize: E = T2^T * En * T1
    let e = linalg::mat33_mul(&linalg::mat33_mul(&linalg::transpose_mat33(&t2), &en), &t1);
    if !e.iter().flatten().all(|v| v.is_finite()) {
        return Err(EssentialError::Degenerate);
    }

    Ok(enforce_essential_constraints(&e))
}

/// Enforce the (1,1,0) singular value constraint on an essential matrix.
pub fn enforce_essential_constraints(e: &Mat33) -> Mat33 {
    let svd = linalg::svd3(e);
    let s = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
    linalg::mat33_mul(
        &linalg::mat33_mul(&svd.u, &s),
        &linalg::transpose_mat33(&svd.v),
    )
}

fn negate_last_column(m: &mut Mat33) {
    for row in m.iter_mut() {
        row[2] = -row[2];
    }
}

/// Decompose an essential matrix into its four possible (R, t) solutions.
///
/// Every candidate has a proper rotation and a unit translation. Exactly one
/// of them places the scene in front of both cameras.
pub fn decompose_essential(e: &Mat33) -> [PoseCandidate; 4] {
    let svd = linalg::svd3(e);
    let (mut u, mut v) = (svd.u, svd.v);

    if linalg::det_mat33(&u) < 0.0 {
        negate_last_column(&mut u);
    }
    if linalg::det_mat33(&v) < 0.0 {
        negate_last_column(&mut v);
    }

    let w = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    let vt = linalg::transpose_mat33(&v);
    let r_a = linalg::mat33_mul(&linalg::mat33_mul(&u, &w), &vt);
    let r_b = linalg::mat33_mul(&linalg::mat33_mul(&u, &linalg::transpose_mat33(&w)), &vt);

    let t = [u[0][2], u[1][2], u[2][2]];
    let t_norm = linalg::norm3(&t);
    let t = if t_norm > 0.0 {
        [t[0] / t_norm, t[1] / t_norm, t[2] / t_norm]
    } else {
        t
    };
    let t_neg = [-t[0], -t[1], -t[2]];

    [
        PoseCandidate {
            kind: CandidateKind::RotationAPositive,
            rotation: r_a,
            translation: t,
        },
        PoseCandidate {
            kind: CandidateKind::RotationANegative,
            rotation: r_a,
            translation: t_neg,
        },
        PoseCandidate {
            kind: CandidateKind::RotationBPositive,
            rotation: r_b,
            translation: t,
        },
        PoseCandidate {
            kind: CandidateKind::RotationBNegative,
            rotation: r_b,
            translation: t_neg,
        },
    ]
}

/// Squared Sampson distance of a correspondence to the epipolar constraint `x2^T E x1 = 0`.
pub fn sampson_distance(e: &Mat33, x1: &[f64; 2], x2: &[f64; 2]) -> f64 {
    let p1 = [x1[0], x1[1], 1.0];
    let p2 = [x2[0], x2[1], 1.0];
    let ex1 = linalg::mat33_mul_vec3(e, &p1);
    let etx2 = linalg::mat33_mul_vec3(&linalg::transpose_mat33(e), &p2);
    let num = linalg::dot_product3(&p2, &ex1);
    let denom = ex1[0] * ex1[0] + ex1[1] * ex1[1] + etx2[0] * etx2[0] + etx2[1] * etx2[1];
    if denom <= f64::EPSILON {
        return f64::INFINITY;
    }
    num * num / denom
}

/// Score the four candidates by cheirality and return the best one.
///
/// Each candidate is scored with the number of masked correspondences that
/// triangulate with positive depth in both views. Ties keep the earlier
/// candidate. Returns `None` when no candidate places a single point in front
/// of both cameras.
pub fn select_pose(
    candidates: &[PoseCandidate; 4],
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    inlier_mask: &[bool],
) -> Option<(PoseCandidate, usize)> {
    let mut best: Option<(PoseCandidate, usize)> = None;
    for candidate in candidates {
        let count = triangulation::count_cheiral(
            x1,
            x2,
            Some(inlier_mask),
            &candidate.rotation,
            &candidate.translation,
        );
        log::trace!("cheirality {:?}: {count} points in front", candidate.kind);
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((*candidate, count));
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn rotation_y(angle: f64) -> Mat33 {
        let (s, c) = angle.sin_cos();
        [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
    }

    // non-planar scene seen from two cameras, x2 = R x1 + t
    pub(crate) fn synthetic_views(r: &Mat33, t: &Vec3, n: usize) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let mut x1 = Vec::with_capacity(n);
        let mut x2 = Vec::with_capacity(n);
        for i in 0..n {
            let fi = i as f64;
            let p = [
                (fi * 0.37).sin() * 2.0,
                (fi * 0.61).cos() * 1.5,
                5.0 + (fi * 0.23).sin() * 2.0 + (i % 3) as f64,
            ];
            let q = triangulation::transform_point(r, t, &p);
            x1.push([p[0] / p[2], p[1] / p[2]]);
            x2.push([q[0] / q[2], q[1] / q[2]]);
        }
        (x1, x2)
    }

    #[test]
    fn test_essential_8point_epipolar_constraint() -> Result<(), EssentialError> {
        let r = rotation_y(0.1);
        let t = [1.0, 0.1, 0.0];
        let (x1, x2) = synthetic_views(&r, &t, 20);
        let e = essential_8point(&x1, &x2)?;
        for (p, q) in x1.iter().zip(x2.iter()) {
            assert!(sampson_distance(&e, p, q) < 1e-12);
        }
        let s = linalg::svd3(&e).s;
        assert_relative_eq!(s[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(s[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(s[2], 0.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_decompose_essential_recovers_pose() -> Result<(), EssentialError> {
        let r = rotation_y(-0.2);
        let t_raw = [0.5, -0.2, 0.1];
        let (x1, x2) = synthetic_views(&r, &t_raw, 30);
        let e = essential_8point(&x1, &x2)?;
        let candidates = decompose_essential(&e);
        for c in &candidates {
            assert_relative_eq!(linalg::det_mat33(&c.rotation), 1.0, epsilon = 1e-9);
            assert_relative_eq!(linalg::norm3(&c.translation), 1.0, epsilon = 1e-9);
        }

        let mask = vec![true; x1.len()];
        let (best, count) = select_pose(&candidates, &x1, &x2, &mask).unwrap();
        assert_eq!(count, x1.len());

        let norm = linalg::norm3(&t_raw);
        for k in 0..3 {
            assert_relative_eq!(best.translation[k], t_raw[k] / norm, epsilon = 1e-6);
            for j in 0..3 {
                assert_relative_eq!(best.rotation[k][j], r[k][j], epsilon = 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_essential_errors() {
        let pts = [[0.0, 0.0]; 7];
        assert_eq!(
            essential_8point(&pts, &pts),
            Err(EssentialError::NotEnoughPoints(7))
        );
        assert_eq!(
            essential_8point(&pts, &pts[..6]),
            Err(EssentialError::MismatchedLengths(7, 6))
        );
        // a planar scene leaves a multi-dimensional null space
        let r = rotation_y(0.05);
        let t = [1.0, 0.0, 0.0];
        let planar: Vec<Vec3> = (0..12)
            .map(|i| [(i % 4) as f64 - 1.5, (i / 4) as f64 - 1.0, 6.0])
            .collect();
        let x1: Vec<[f64; 2]> = planar.iter().map(|p| [p[0] / p[2], p[1] / p[2]]).collect();
        let x2: Vec<[f64; 2]> = planar
            .iter()
            .map(|p| triangulation::transform_point(&r, &t, p))
            .map(|q| [q[0] / q[2], q[1] / q[2]])
            .collect();
        assert_eq!(essential_8point(&x1, &x2), Err(EssentialError::Degenerate));
    }
}
