use geopose_image::Image;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::fast::FastCorner;

/// Number of bits in a BRIEF descriptor.
pub const DESCRIPTOR_BITS: u32 = 256;

/// A 256-bit binary descriptor.
pub type Descriptor = [u8; 32];

// half size of the box filter applied before the intensity tests
const SMOOTH_RADIUS: i32 = 2;

/// BRIEF descriptor extractor.
///
/// Each bit is an intensity comparison between two points of a patch centered
/// on the keypoint, measured on a 5x5 box-filtered image. The test pattern is
/// drawn once from a seeded generator so descriptors are reproducible.
#[derive(Clone, Debug)]
pub struct BriefExtractor {
    patch_size: usize,
    pairs: Vec<[i32; 4]>,
}

impl BriefExtractor {
    /// Create an extractor with a square patch of `patch_size` pixels.
    ///
    /// The patch size is clamped to the odd range `5..=63`.
    pub fn new(patch_size: usize, seed: u64) -> Self {
        let patch_size = patch_size.clamp(5, 63) | 1;
        let half = (patch_size / 2) as i32;
        let mut rng = StdRng::seed_from_u64(seed);
        let pairs = (0..DESCRIPTOR_BITS)
            .map(|_| {
                [
                    rng.random_range(-half..=half),
                    rng.random_range(-half..=half),
                    rng.random_range(-half..=half),
                    rng.random_range(-half..=half),
                ]
            })
            .collect();
        Self { patch_size, pairs }
    }

    /// Side length of the sampling patch.
    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Distance to the image border a keypoint needs to be described.
    pub fn border(&self) -> i32 {
        (self.patch_size / 2) as i32 + SMOOTH_RADIUS
    }

    /// Compute descriptors for the given corners.
    ///
    /// Corners closer than [`Self::border`] to the image border are skipped.
    ///
    /// # Returns
    ///
    /// The integer pixel locations of the described corners, as `f32`, and their descriptors, in input order.
    pub fn compute(
        &self,
        image: &Image<u8, 1>,
        corners: &[FastCorner],
    ) -> (Vec<[f32; 2]>, Vec<Descriptor>) {
        let (cols, rows) = (image.cols() as i32, image.rows() as i32);
        let border = self.border();
        let integral = IntegralImage::new(image);

        let mut keypoints = Vec::with_capacity(corners.len());
        let mut descriptors = Vec::with_capacity(corners.len());

        for corner in corners {
            if corner.x < border
                || corner.y < border
                || corner.x >= cols - border
                || corner.y >= rows - border
            {
                continue;
            }
            let mut desc = [0u8; 32];
            for (bit, p) in self.pairs.iter().enumerate() {
                let a = integral.box_sum(corner.x + p[0], corner.y + p[1], SMOOTH_RADIUS);
                let b = integral.box_sum(corner.x + p[2], corner.y + p[3], SMOOTH_RADIUS);
                if a < b {
                    desc[bit / 8] |= 1 << (bit % 8);
                }
            }
            keypoints.push([corner.x as f32, corner.y as f32]);
            descriptors.push(desc);
        }

        (keypoints, descriptors)
    }
}

struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(image: &Image<u8, 1>) -> Self {
        let (cols, rows) = (image.cols(), image.rows());
        let stride = cols + 1;
        let mut sums = vec![0u64; stride * (rows + 1)];
        let data = image.as_slice();
        for y in 0..rows {
            let mut row_sum = 0u64;
            for x in 0..cols {
                row_sum += data[y * cols + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { stride, sums }
    }

    // sum over the (2r+1)^2 window centered at (x, y), the window must be inside the image
    fn box_sum(&self, x: i32, y: i32, r: i32) -> u64 {
        let (x0, y0) = ((x - r) as usize, (y - r) as usize);
        let (x1, y1) = ((x + r + 1) as usize, (y + r + 1) as usize);
        let s = &self.sums;
        s[y1 * self.stride + x1] + s[y0 * self.stride + x0]
            - s[y0 * self.stride + x1]
            - s[y1 * self.stride + x0]
    }
}
