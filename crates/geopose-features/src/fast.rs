use std::collections::HashMap;

use geopose_image::Image;
use rayon::prelude::*;

/// A FAST corner with its Sum of Absolute Differences score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FastCorner {
    /// Column of the corner.
    pub x: i32,
    /// Row of the corner.
    pub y: i32,
    /// Corner strength, higher is stronger.
    pub score: i32,
}

// Bresenham circle of radius 3, clockwise starting at the top.
fn circle_offsets(cols: i32) -> [i32; 16] {
    [
        -3 * cols,     // 1
        -3 * cols + 1, // 2
        -2 * cols + 2, // 3
        -cols + 3,     // 4
        3,             // 5
        cols + 3,      // 6
        2 * cols + 2,  // 7
        3 * cols + 1,  // 8
        3 * cols,      // 9
        3 * cols - 1,  // 10
        2 * cols - 2,  // 11
        cols - 3,      // 12
        -3,            // 13
        -cols - 3,     // 14
        -2 * cols - 2, // 15
        -3 * cols - 1, // 16
    ]
}

/// Calculate the FAST corner score for a pixel using Sum of Absolute Differences (SAD).
/// Based on <https://www.edwardrosten.com/work/rosten_2006_machine.pdf>.
///
/// Returns `None` if the pixel is not a corner.
fn corner_score(
    src: &[u8],
    pixel_idx: usize,
    offsets: &[i32; 16],
    threshold: u8,
    arc_length: u8,
) -> Option<i32> {
    let center = src[pixel_idx];
    let lower = center.saturating_sub(threshold);
    let upper = center.saturating_add(threshold);
    let pixel = |k: usize| src[(pixel_idx as i64 + offsets[k] as i64) as usize];

    // high-speed test on the four compass points
    let compass = [pixel(0), pixel(4), pixel(8), pixel(12)];
    let brighter = compass.iter().filter(|&&p| p > upper).count();
    let darker = compass.iter().filter(|&&p| p < lower).count();
    let min_compass = if arc_length >= 12 { 3 } else { 0 };
    if brighter < min_compass && darker < min_compass {
        return None;
    }

    let mut pixels = [0u8; 16];
    for (k, p) in pixels.iter_mut().enumerate() {
        *p = pixel(k);
    }

    // walk the circle twice so that arcs wrapping around the start are found
    let (mut run_bright, mut run_dark) = (0u8, 0u8);
    let mut is_bright = None;
    for k in 0..32 {
        let p = pixels[k % 16];
        if p > upper {
            run_bright += 1;
            run_dark = 0;
        } else if p < lower {
            run_dark += 1;
            run_bright = 0;
        } else {
            run_bright = 0;
            run_dark = 0;
        }
        if run_bright >= arc_length {
            is_bright = Some(true);
            break;
        }
        if run_dark >= arc_length {
            is_bright = Some(false);
            break;
        }
    }

    let is_bright = is_bright?;
    let score = pixels
        .iter()
        .filter(|&&p| if is_bright { p > upper } else { p < lower })
        .map(|&p| center.abs_diff(p) as i32 - threshold as i32)
        .sum();

    Some(score)
}

/// Fast feature detector
///
/// # Arguments
///
/// * `src` - The source image as Gray8 image.
/// * `threshold` - The intensity difference to the center pixel for a circle pixel to count.
/// * `arc_length` - The number of consecutive pixels in the Bresenham circle that must be
///   brighter or darker than the center pixel, clamped to `1..=16`.
///
/// # Returns
///
/// The detected corners in row-major order. Images smaller than 7x7 have no corners.
pub fn fast_feature_detector(src: &Image<u8, 1>, threshold: u8, arc_length: u8) -> Vec<FastCorner> {
    let (cols, rows) = (src.cols() as i32, src.rows() as i32);
    if cols < 7 || rows < 7 {
        return Vec::new();
    }
    let arc_length = arc_length.clamp(1, 16);
    let offsets = circle_offsets(cols);
    let data = src.as_slice();

    // Process rows in parallel
    (3..rows - 3)
        .into_par_iter()
        .flat_map_iter(|y| {
            let row_start_idx = y * cols;
            (3..cols - 3).filter_map(move |x| {
                corner_score(
                    data,
                    (row_start_idx + x) as usize,
                    &offsets,
                    threshold,
                    arc_length,
                )
                .map(|score| FastCorner { x, y, score })
            })
        })
        .collect()
}

/// Greedy non-maximum suppression over FAST corners.
///
/// Corners are visited strongest first (ties broken by row then column) and
/// kept when no already kept corner lies closer than `radius` pixels. At most
/// `max_features` corners are returned. A `radius` of zero only truncates.
pub fn non_max_suppression(
    corners: &[FastCorner],
    radius: u32,
    max_features: usize,
) -> Vec<FastCorner> {
    let mut sorted = corners.to_vec();
    sorted.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    if radius == 0 {
        sorted.truncate(max_features);
        return sorted;
    }

    let cell = radius as i32;
    let radius_sq = (radius * radius) as i32;
    let mut grid: HashMap<(i32, i32), Vec<(i32, i32)>> = HashMap::new();
    let mut kept = Vec::with_capacity(max_features.min(sorted.len()));

    for corner in sorted {
        if kept.len() >= max_features {
            break;
        }
        let (cx, cy) = (corner.x.div_euclid(cell), corner.y.div_euclid(cell));
        let suppressed = (-1..=1).any(|dy| {
            (-1..=1).any(|dx| {
                grid.get(&(cx + dx, cy + dy)).is_some_and(|pts| {
                    pts.iter().any(|&(px, py)| {
                        let (ex, ey) = (px - corner.x, py - corner.y);
                        ex * ex + ey * ey < radius_sq
                    })
                })
            })
        });
        if suppressed {
            continue;
        }
        grid.entry((cx, cy)).or_default().push((corner.x, corner.y));
        kept.push(corner);
    }

    kept
}
