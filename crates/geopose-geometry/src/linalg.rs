/// Row-major 3x3 matrix.
pub type Mat33 = [[f64; 3]; 3];

/// 3-vector.
pub type Vec3 = [f64; 3];

/// The 3x3 identity matrix.
pub const IDENTITY33: Mat33 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Compute the determinant of a 3x3 matrix.
#[rustfmt::skip]
pub fn det_mat33(m: &Mat33) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) -
    m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0]) +
    m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Multiply two 3x3 matrices.
pub fn mat33_mul(a: &Mat33, b: &Mat33) -> Mat33 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Multiply a 3x3 matrix with a 3-vector.
pub fn mat33_mul_vec3(m: &Mat33, v: &Vec3) -> Vec3 {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Transpose a 3x3 matrix.
pub fn transpose_mat33(m: &Mat33) -> Mat33 {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Invert a 3x3 matrix, `None` if it is singular.
pub fn inverse_mat33(m: &Mat33) -> Option<Mat33> {
    let det = det_mat33(m);
    if det.abs() < 1e-15 {
        return None;
    }
    let inv_det = 1.0 / det;
    #[rustfmt::skip]
    let adj = [
        [m[1][1] * m[2][2] - m[1][2] * m[2][1], m[0][2] * m[2][1] - m[0][1] * m[2][2], m[0][1] * m[1][2] - m[0][2] * m[1][1]],
        [m[1][2] * m[2][0] - m[1][0] * m[2][2], m[0][0] * m[2][2] - m[0][2] * m[2][0], m[0][2] * m[1][0] - m[0][0] * m[1][2]],
        [m[1][0] * m[2][1] - m[1][1] * m[2][0], m[0][1] * m[2][0] - m[0][0] * m[2][1], m[0][0] * m[1][1] - m[0][1] * m[1][0]],
    ];
    let mut inv = [[0.0; 3]; 3];
    for (inv_row, adj_row) in inv.iter_mut().zip(adj.iter()) {
        for (v, a) in inv_row.iter_mut().zip(adj_row.iter()) {
            *v = a * inv_det;
        }
    }
    Some(inv)
}

/// Cross product of two 3-vectors.
pub fn cross_vec3(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Dot product of two 3-vectors.
pub fn dot_product3(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm of a 3-vector.
pub fn norm3(v: &Vec3) -> f64 {
    dot_product3(v, v).sqrt()
}

/// Skew-symmetric matrix such that `skew(a) * b == cross(a, b)`.
pub fn skew(v: &Vec3) -> Mat33 {
    [[0.0, -v[2], v[1]], [v[2], 0.0, -v[0]], [-v[1], v[0], 0.0]]
}

/// Normalize a projective 3x3 matrix in place.
///
/// The matrix is scaled so that `m[2][2] == 1`, or to unit Frobenius norm when
/// `m[2][2]` vanishes.
pub fn normalize_mat33_inplace(m: &mut Mat33) {
    let scale = if m[2][2].abs() > 1e-12 {
        m[2][2]
    } else {
        m.iter().flatten().map(|v| v * v).sum::<f64>().sqrt()
    };
    if scale == 0.0 {
        return;
    }
    m.iter_mut().flatten().for_each(|v| *v /= scale);
}

/// Singular value decomposition of a 3x3 matrix, `m = u * diag(s) * v^T`.
#[derive(Clone, Copy, Debug)]
pub struct Svd3 {
    /// Left singular vectors as columns.
    pub u: Mat33,
    /// Singular values in non-increasing order.
    pub s: Vec3,
    /// Right singular vectors as columns.
    pub v: Mat33,
}

/// Compute the singular value decomposition of a 3x3 matrix.
pub fn svd3(m: &Mat33) -> Svd3 {
    let mut mat = faer::Mat::<f64>::zeros(3, 3);
    for (i, row) in m.iter().enumerate() {
        for (j, &val) in row.iter().enumerate() {
            mat.write(i, j, val);
        }
    }
    let svd = mat.svd();
    let (u_ref, v_ref, s_ref) = (svd.u(), svd.v(), svd.s_diagonal());
    let mut out = Svd3 {
        u: [[0.0; 3]; 3],
        s: [0.0; 3],
        v: [[0.0; 3]; 3],
    };
    for i in 0..3 {
        out.s[i] = s_ref.read(i);
        for j in 0..3 {
            out.u[i][j] = u_ref.read(i, j);
            out.v[i][j] = v_ref.read(i, j);
        }
    }
    out
}

/// Accumulated normal equations `A^T A` of a homogeneous 9-parameter system.
///
/// Rows are added one at a time, so the design matrix never has to be
/// materialized and the solve is a fixed-size 9x9 decomposition whatever the
/// number of points.
#[derive(Clone, Debug)]
pub struct NormalEquations9 {
    ata: [[f64; 9]; 9],
    rows: usize,
}

impl Default for NormalEquations9 {
    fn default() -> Self {
        Self {
            ata: [[0.0; 9]; 9],
            rows: 0,
        }
    }
}

impl NormalEquations9 {
    /// Add one row of the design matrix.
    pub fn add_row(&mut self, row: &[f64; 9]) {
        for i in 0..9 {
            for j in i..9 {
                self.ata[i][j] += row[i] * row[j];
            }
        }
        self.rows += 1;
    }

    /// Number of rows accumulated so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Unit vector spanning the one-dimensional null space of the system.
    ///
    /// Returns `None` if the null space has more than one dimension, i.e. the
    /// second smallest eigenvalue is negligible compared to the largest one.
    pub fn null_vector(&self) -> Option<[f64; 9]> {
        let mut mat = faer::Mat::<f64>::zeros(9, 9);
        for i in 0..9 {
            for j in i..9 {
                mat.write(i, j, self.ata[i][j]);
                mat.write(j, i, self.ata[i][j]);
            }
        }
        let svd = mat.svd();
        let s = svd.s_diagonal();
        let (largest, second_smallest) = (s.read(0), s.read(7));
        if !largest.is_finite() || largest <= 0.0 || second_smallest <= 1e-12 * largest {
            return None;
        }
        let v = svd.v();
        let mut out = [0.0; 9];
        for (k, val) in out.iter_mut().enumerate() {
            *val = v.read(k, 8);
        }
        Some(out)
    }
}

/// Normalize 2d points with a similarity transform to zero mean and mean distance sqrt(2).
///
/// Returns the normalized points and the 3x3 transform `T` such that `x_n = T * x`.
pub fn normalize_points_2d(x: &[[f64; 2]]) -> (Vec<[f64; 2]>, Mat33) {
    let n = x.len().max(1) as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in x {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;
    let mean_dist = x
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let xn = x
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();
    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];
    (xn, t)
}

// eigenvalues (largest, smallest) of the 2x2 scatter matrix around the centroid
fn scatter_eigenvalues(points: &[[f64; 2]]) -> (f64, f64) {
    let n = points.len().max(1) as f64;
    let (mx, my) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    let (mx, my) = (mx / n, my / n);
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p[0] - mx, p[1] - my);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let half_trace = 0.5 * (sxx + syy);
    let disc = (0.25 * (sxx - syy).powi(2) + sxy * sxy).sqrt();
    (half_trace + disc, (half_trace - disc).max(0.0))
}

/// Root mean square distance of 2d points to their total least squares line.
///
/// Zero for fewer than three points.
pub fn line_spread(points: &[[f64; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let (_, l_min) = scatter_eigenvalues(points);
    (l_min / points.len() as f64).sqrt()
}

/// Check whether a set of 2d points is collinear or coincident.
///
/// The points are collinear when their RMS distance to the best fitting line
/// ([`line_spread`]) is at most `tolerance`, in the units of the points, or when
/// the spread across the line vanishes relative to the spread along it.
pub fn is_collinear_set(points: &[[f64; 2]], tolerance: f64) -> bool {
    if points.len() < 3 {
        return true;
    }
    let (l_max, l_min) = scatter_eigenvalues(points);
    l_max <= 0.0
        || l_min <= 1e-10 * l_max
        || (l_min / points.len() as f64).sqrt() <= tolerance
}
