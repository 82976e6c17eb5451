use rayon::prelude::*;

use crate::{Image, ImageError, ImageSize};

#[rustfmt::skip]
fn determinant3x3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) -
    m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0]) +
    m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inverse_perspective_matrix(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = determinant3x3(m);
    if det.abs() < f64::EPSILON {
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

fn transform_point(x: f64, y: f64, m: &[[f64; 3]; 3]) -> Option<(f64, f64)> {
    let w = m[2][0] * x + m[2][1] * y + m[2][2];
    if w.abs() < 1e-12 {
        return None;
    }
    let u = (m[0][0] * x + m[0][1] * y + m[0][2]) / w;
    let v = (m[1][0] * x + m[1][1] * y + m[1][2]) / w;
    Some((u, v))
}

fn bilinear_u8(src: &Image<u8, 1>, u: f64, v: f64) -> u8 {
    let (cols, rows) = (src.cols() as f64, src.rows() as f64);
    if u < 0.0 || v < 0.0 || u > cols - 1.0 || v > rows - 1.0 {
        return 0;
    }
    let (x0, y0) = (u.floor() as usize, v.floor() as usize);
    let x1 = (x0 + 1).min(src.cols() - 1);
    let y1 = (y0 + 1).min(src.rows() - 1);
    let (ax, ay) = (u - x0 as f64, v - y0 as f64);
    let data = src.as_slice();
    let px = |x: usize, y: usize| data[y * src.cols() + x] as f64;
    let top = px(x0, y0) * (1.0 - ax) + px(x1, y0) * ax;
    let bottom = px(x0, y1) * (1.0 - ax) + px(x1, y1) * ax;
    (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8
}

/// Applies a perspective transformation to a grayscale image.
///
/// * `src` - The input image.
/// * `m` - The 3x3 perspective transformation matrix src -> dst.
/// * `dst_size` - The size of the output image.
///
/// Destination pixels that map outside of the source image are set to zero.
///
/// # Errors
///
/// Returns [`ImageError::NonInvertibleTransform`] if `m` is not invertible.
pub fn warp_perspective_u8(
    src: &Image<u8, 1>,
    m: &[[f64; 3]; 3],
    dst_size: ImageSize,
) -> Result<Image<u8, 1>, ImageError> {
    let m_inv = inverse_perspective_matrix(m).ok_or(ImageError::NonInvertibleTransform)?;
    let mut dst = Image::from_size_val(dst_size, 0u8)?;
    if dst_size.is_empty() || src.size().is_empty() {
        return Ok(dst);
    }

    dst.as_slice_mut()
        .par_chunks_exact_mut(dst_size.width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                if let Some((u, v)) = transform_point(x as f64, y as f64, &m_inv) {
                    *out = bilinear_u8(src, u, v);
                }
            }
        });

    Ok(dst)
}
