use rayon::prelude::*;

use crate::{Image, ImageError};

/// Channel ordering of a color image.
///
/// Camera drivers and map tile decoders disagree on the ordering, so the
/// caller states it explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Red, green, blue (optionally followed by alpha).
    #[default]
    Rgb,
    /// Blue, green, red (optionally followed by alpha).
    Bgr,
}

// fixed-point luma weights, sum to 256
const RW: u16 = 77;
const GW: u16 = 150;
const BW: u16 = 29;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 * RW + g as u16 * GW + b as u16 * BW) >> 8) as u8
}

fn check_sizes<const C: usize>(src: &Image<u8, C>, dst: &Image<u8, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    Ok(())
}

fn gray_from_color<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, 1>,
    order: ChannelOrder,
) -> Result<(), ImageError> {
    check_sizes(src, dst)?;
    let cols = src.cols();
    if cols == 0 {
        return Ok(());
    }

    // parallelize the grayscale conversion by rows
    src.as_slice()
        .par_chunks_exact(cols * C)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(cols))
        .for_each(|(src_row, dst_row)| {
            for (src_pixel, dst_pixel) in src_row.chunks_exact(C).zip(dst_row.iter_mut()) {
                let (r, g, b) = match order {
                    ChannelOrder::Rgb => (src_pixel[0], src_pixel[1], src_pixel[2]),
                    ChannelOrder::Bgr => (src_pixel[2], src_pixel[1], src_pixel[0]),
                };
                *dst_pixel = luma(r, g, b);
            }
        });

    Ok(())
}

/// Convert an RGB8 image to grayscale using the formula:
///
/// Y = (77 * R + 150 * G + 29 * B) >> 8
///
/// Precondition: the input and output images must have the same size.
pub fn gray_from_rgb_u8(src: &Image<u8, 3>, dst: &mut Image<u8, 1>) -> Result<(), ImageError> {
    gray_from_color(src, dst, ChannelOrder::Rgb)
}

/// Convert a BGR8 image to grayscale with the same weights as [`gray_from_rgb_u8`].
///
/// Precondition: the input and output images must have the same size.
pub fn gray_from_bgr_u8(src: &Image<u8, 3>, dst: &mut Image<u8, 1>) -> Result<(), ImageError> {
    gray_from_color(src, dst, ChannelOrder::Bgr)
}

/// Convert an 8-bit image with 1, 3 or 4 channels into a new grayscale image.
///
/// Single channel images are copied, the alpha channel of 4-channel images is ignored.
///
/// # Errors
///
/// Returns [`ImageError::UnsupportedChannels`] for any other channel count.
///
/// # Example
///
/// ```
/// use geopose_image::{color::to_gray_u8, ChannelOrder, Image, ImageSize};
///
/// let image = Image::<u8, 3>::new(ImageSize { width: 2, height: 1 }, vec![255, 255, 255, 0, 0, 0]).unwrap();
/// let gray = to_gray_u8(&image, ChannelOrder::Rgb).unwrap();
/// assert_eq!(gray.as_slice(), &[255, 0]);
/// ```
pub fn to_gray_u8<const C: usize>(
    src: &Image<u8, C>,
    order: ChannelOrder,
) -> Result<Image<u8, 1>, ImageError> {
    match C {
        1 => Image::new(src.size(), src.as_slice().to_vec()),
        3 | 4 => {
            let mut dst = Image::from_size_val(src.size(), 0u8)?;
            gray_from_color(src, &mut dst, order)?;
            Ok(dst)
        }
        _ => Err(ImageError::UnsupportedChannels(C)),
    }
}
