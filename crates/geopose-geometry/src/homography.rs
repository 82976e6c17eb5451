use crate::linalg::{self, Mat33, NormalEquations9};

/// Errors of the homography estimators.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    /// Fewer than four points were given.
    #[error("At least 4 points are required, got {0}")]
    NotEnoughPoints(usize),

    /// The two point sets have different lengths.
    #[error("Point sets have different lengths: {0} vs {1}")]
    MismatchedLengths(usize, usize),

    /// The points do not constrain a unique homography.
    #[error("Degenerate point configuration")]
    Degenerate,

    /// The estimated homography is singular.
    #[error("Homography is singular")]
    Singular,
}

// three points are collinear when the triangle they span is negligible or
// its smallest height is within `tolerance`
fn collinear3(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2], tolerance: f64) -> bool {
    let (abx, aby) = (b[0] - a[0], b[1] - a[1]);
    let (acx, acy) = (c[0] - a[0], c[1] - a[1]);
    let (bcx, bcy) = (c[0] - b[0], c[1] - b[1]);
    let cross = abx * acy - aby * acx;
    let (ab, ac) = ((abx * abx + aby * aby).sqrt(), (acx * acx + acy * acy).sqrt());
    let scale = ab * ac;
    if scale == 0.0 || cross.abs() <= 1e-9 * scale {
        return true;
    }
    let longest = ab.max(ac).max((bcx * bcx + bcy * bcy).sqrt());
    cross.abs() / longest <= tolerance
}

/// Whether any three of the given points are collinear (or coincide).
///
/// A minimal homography sample with such a triple does not define a unique
/// homography.
pub fn is_collinear_sample(points: &[[f64; 2]]) -> bool {
    is_collinear_sample_within(points, 0.0)
}

/// Whether any three of the given points lie within `tolerance` of a common line.
///
/// A triple is rejected when its triangle's smallest height is at most
/// `tolerance`, in the units of the points.
pub fn is_collinear_sample_within(points: &[[f64; 2]], tolerance: f64) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if collinear3(&points[i], &points[j], &points[k], tolerance) {
                    return true;
                }
            }
        }
    }
    false
}

/// Compute the homography matrix from four 2d point correspondences.
///
/// * `x1` - The source 2d points.
/// * `x2` - The destination 2d points.
///
/// Returns the homography from src to dst normalized so that `h[2][2] == 1`.
pub fn homography_4pt2d(x1: &[[f64; 2]; 4], x2: &[[f64; 2]; 4]) -> Result<Mat33, HomographyError> {
    if is_collinear_sample(x1) || is_collinear_sample(x2) {
        return Err(HomographyError::Degenerate);
    }
    homography_dlt(x1, x2)
}

/// Compute the homography from `n >= 4` point correspondences with the normalized DLT.
///
/// Both point sets are normalized (Hartley) before building the linear system
/// and the solution is denormalized as `H = T2^-1 * Hn * T1`.
///
/// * `x1` - The source 2d points.
/// * `x2` - The destination 2d points.
pub fn homography_dlt(x1: &[[f64; 2]], x2: &[[f64; 2]]) -> Result<Mat33, HomographyError> {
    if x1.len() != x2.len() {
        return Err(HomographyError::MismatchedLengths(x1.len(), x2.len()));
    }
    if x1.len() < 4 {
        return Err(HomographyError::NotEnoughPoints(x1.len()));
    }

    let (x1n, t1) = linalg::normalize_points_2d(x1);
    let (x2n, t2) = linalg::normalize_points_2d(x2);

    let mut neq = NormalEquations9::default();
    for (p, q) in x1n.iter().zip(x2n.iter()) {
        let (x, y) = (p[0], p[1]);
        let (u, v) = (q[0], q[1]);
        neq.add_row(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        neq.add_row(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v]);
    }

    let h = neq.null_vector().ok_or(HomographyError::Degenerate)?;
    let hn = [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], h[8]]];

    let t2_inv = linalg::inverse_mat33(&t2).ok_or(HomographyError::Degenerate)?;
    let mut homo = linalg::mat33_mul(&linalg::mat33_mul(&t2_inv, &hn), &t1);
    linalg::normalize_mat33_inplace(&mut homo);

    if !homo.iter().flatten().all(|v| v.is_finite()) || linalg::det_mat33(&homo).abs() < 1e-12 {
        return Err(HomographyError::Singular);
    }

    Ok(homo)
}

/// Map a 2d point through a homography, `None` if it lands at infinity.
pub fn project_point(h: &Mat33, p: &[f64; 2]) -> Option<[f64; 2]> {
    let q = linalg::mat33_mul_vec3(h, &[p[0], p[1], 1.0]);
    if q[2].abs() < 1e-12 {
        return None;
    }
    Some([q[0] / q[2], q[1] / q[2]])
}

/// Squared transfer error `|| x2 - H x1 ||^2` in destination pixels.
///
/// Points mapped to infinity have an infinite error.
pub fn homography_transfer_error(h: &Mat33, x1: &[f64; 2], x2: &[f64; 2]) -> f64 {
    match project_point(h, x1) {
        Some(p) => (p[0] - x2[0]).powi(2) + (p[1] - x2[1]).powi(2),
        None => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn apply(h: &Mat33, pts: &[[f64; 2]]) -> Vec<[f64; 2]> {
        pts.iter().filter_map(|p| project_point(h, p)).collect()
    }

    #[test]
    fn test_homography_4pt2d_identity() -> Result<(), HomographyError> {
        let x1 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let homo = homography_4pt2d(&x1, &x1)?;
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(homo[i][j], linalg::IDENTITY33[i][j], epsilon = 1e-8);
            }
        }
        Ok(())
    }

    #[test]
    fn test_homography_4pt2d_transform() -> Result<(), HomographyError> {
        let x1 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let expected = [[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]];
        let x2v = apply(&expected, &x1);
        let x2 = [x2v[0], x2v[1], x2v[2], x2v[3]];
        let homo = homography_4pt2d(&x1, &x2)?;
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(homo[i][j], expected[i][j], epsilon = 1e-8);
            }
        }
        Ok(())
    }

    #[test]
    fn test_homography_dlt_projective() -> Result<(), HomographyError> {
        let expected = [[0.9, 0.05, 12.0], [-0.08, 1.1, -4.0], [1e-4, -2e-4, 1.0]];
        let x1: Vec<[f64; 2]> = (0..5)
            .flat_map(|i| (0..4).map(move |j| [i as f64 * 60.0, j as f64 * 45.0 + 3.0]))
            .collect();
        let x2 = apply(&expected, &x1);
        let homo = homography_dlt(&x1, &x2)?;
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(homo[i][j], expected[i][j], epsilon = 1e-6);
            }
        }
        for (p, q) in x1.iter().zip(x2.iter()) {
            assert!(homography_transfer_error(&homo, p, q) < 1e-8);
        }
        Ok(())
    }

    #[test]
    fn test_homography_degenerate() {
        let x1 = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [0.0, 1.0]];
        let x2 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        assert_eq!(homography_4pt2d(&x1, &x2), Err(HomographyError::Degenerate));

        let line: Vec<[f64; 2]> = (0..8).map(|i| [i as f64, 3.0]).collect();
        assert!(homography_dlt(&line, &line).is_err());

        assert_eq!(
            homography_dlt(&x1[..3], &x2[..3]),
            Err(HomographyError::NotEnoughPoints(3))
        );
        assert_eq!(
            homography_dlt(&x1, &x2[..3]),
            Err(HomographyError::MismatchedLengths(4, 3))
        );
    }

    #[test]
    fn test_collinear_sample() {
        assert!(is_collinear_sample(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0]]));
        assert!(!is_collinear_sample(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]));
        assert!(is_collinear_sample(&[[0.0, 0.0], [0.0, 0.0], [0.0, 1.0]]));

        // a thin triangle, 0.8 px high over a 100 px base
        let thin = [[0.0, 0.0], [100.0, 0.0], [50.0, 0.8], [20.0, 60.0]];
        assert!(!is_collinear_sample(&thin));
        assert!(is_collinear_sample_within(&thin, 1.0));
        assert!(!is_collinear_sample_within(&thin, 0.5));
    }

    #[test]
    fn test_transfer_error_at_infinity() {
        let h = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        assert_eq!(homography_transfer_error(&h, &[0.0, 5.0], &[0.0, 0.0]), f64::INFINITY);
    }
}
