use crate::linalg::{Mat33, Vec3};

/// Transform a point from the first camera frame into the second, `R * x + t`.
pub fn transform_point(r: &Mat33, t: &Vec3, x: &Vec3) -> Vec3 {
    let rx = crate::linalg::mat33_mul_vec3(r, x);
    [rx[0] + t[0], rx[1] + t[1], rx[2] + t[2]]
}

fn write_dlt_row(a: &mut faer::Mat<f64>, row: usize, x: f64, p3: &[f64; 4], p1: &[f64; 4]) {
    for j in 0..4 {
        a.write(row, j, x * p3[j] - p1[j]);
    }
}

/// Triangulate a point from two views with the linear (DLT) method.
///
/// The first camera is `[I | 0]` and the second `[R | t]`, the inputs are
/// normalized camera coordinates.
///
/// Returns the point in the first camera frame, or `None` if it lies at infinity.
pub fn triangulate_point_linear(x1: &[f64; 2], x2: &[f64; 2], r: &Mat33, t: &Vec3) -> Option<Vec3> {
    let p1 = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
    let p2 = [
        [r[0][0], r[0][1], r[0][2], t[0]],
        [r[1][0], r[1][1], r[1][2], t[1]],
        [r[2][0], r[2][1], r[2][2], t[2]],
    ];

    let mut a = faer::Mat::<f64>::zeros(4, 4);
    write_dlt_row(&mut a, 0, x1[0], &p1[2], &p1[0]);
    write_dlt_row(&mut a, 1, x1[1], &p1[2], &p1[1]);
    write_dlt_row(&mut a, 2, x2[0], &p2[2], &p2[0]);
    write_dlt_row(&mut a, 3, x2[1], &p2[2], &p2[1]);

    let svd = a.svd();
    let v = svd.v();
    let w = v.read(3, 3);
    if w.abs() < 1e-12 {
        return None;
    }
    Some([v.read(0, 3) / w, v.read(1, 3) / w, v.read(2, 3) / w])
}

/// Count the masked correspondences that triangulate in front of both cameras.
///
/// * `x1` - Normalized coordinates in the first view.
/// * `x2` - Normalized coordinates in the second view.
/// * `mask` - Which correspondences take part, `None` for all of them.
pub fn count_cheiral(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    mask: Option<&[bool]>,
    r: &Mat33,
    t: &Vec3,
) -> usize {
    x1.iter()
        .zip(x2.iter())
        .enumerate()
        .filter(|(i, _)| mask.map_or(true, |m| m.get(*i).copied().unwrap_or(false)))
        .filter_map(|(_, (p, q))| triangulate_point_linear(p, q, r, t))
        .filter(|x| x[2] > 0.0 && transform_point(r, t, x)[2] > 0.0)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(x: &Vec3) -> [f64; 2] {
        [x[0] / x[2], x[1] / x[2]]
    }

    #[test]
    fn test_triangulate_recovers_point() {
        let r = crate::linalg::IDENTITY33;
        let t = [-1.0, 0.0, 0.0];
        let x = [0.3, -0.2, 4.0];
        let x1 = project(&x);
        let x2 = project(&transform_point(&r, &t, &x));
        let tri = triangulate_point_linear(&x1, &x2, &r, &t).unwrap();
        for k in 0..3 {
            assert_relative_eq!(tri[k], x[k], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_count_cheiral() {
        let r = crate::linalg::IDENTITY33;
        let t = [-1.0, 0.0, 0.0];
        let points = [[0.0, 0.0, 5.0], [1.0, 1.0, 3.0], [-1.0, 0.5, 6.0]];
        let x1: Vec<_> = points.iter().map(project).collect();
        let x2: Vec<_> = points.iter().map(|x| project(&transform_point(&r, &t, x))).collect();
        assert_eq!(count_cheiral(&x1, &x2, None, &r, &t), 3);
        assert_eq!(count_cheiral(&x1, &x2, Some(&[true, false, true]), &r, &t), 2);
        // flipping the baseline puts every point behind the cameras
        assert_eq!(count_cheiral(&x1, &x2, None, &r, &[1.0, 0.0, 0.0]), 0);
    }
}
