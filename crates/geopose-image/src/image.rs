use crate::error::ImageError;

/// Width and height of an image, in pixels.
///
/// ```
/// use geopose_image::ImageSize;
///
/// let size = ImageSize::from([640, 480]);
/// assert_eq!(size.area(), 307_200);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSize {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl ImageSize {
    /// Returns true if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by the image.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// Represents an image with pixel data.
///
/// The pixels are stored row-major in interleaved (H, W, C) order. An image
/// is immutable once captured from the point of view of the matching
/// pipeline: backends only ever borrow it.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const CHANNELS: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const CHANNELS: usize> Image<T, CHANNELS> {
    /// Wrap interleaved pixel data.
    ///
    /// Fails with [`ImageError::InvalidChannelShape`] unless `data` holds
    /// exactly `width * height * CHANNELS` values.
    ///
    /// ```
    /// use geopose_image::Image;
    ///
    /// let gray = Image::<u8, 1>::new([4, 2].into(), vec![0; 8]).unwrap();
    /// assert_eq!((gray.cols(), gray.rows()), (4, 2));
    /// assert!(Image::<u8, 3>::new([4, 2].into(), vec![0; 8]).is_err());
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = size.width * size.height * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }
        Ok(Self { size, data })
    }

    /// An image of `size` with every channel of every pixel set to `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        let data = vec![val; size.width * size.height * CHANNELS];
        Image::new(size, data)
    }

    /// The image size.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Alias of [`Image::width`].
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Alias of [`Image::height`].
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// Channels per pixel.
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// Interleaved pixel data.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable interleaved pixel data.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Take the pixel data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Get a single channel value of a pixel.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::PixelIndexOutOfBounds`] if the pixel or channel is outside of the image.
    pub fn get_pixel(&self, x: usize, y: usize, ch: usize) -> Result<&T, ImageError> {
        if x >= self.size.width || y >= self.size.height || ch >= CHANNELS {
            return Err(ImageError::PixelIndexOutOfBounds(x, y, ch));
        }
        Ok(&self.data[(y * self.size.width + x) * CHANNELS + ch])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size() {
        let image_size = ImageSize {
            width: 10,
            height: 20,
        };
        assert_eq!(image_size.width, 10);
        assert_eq!(image_size.height, 20);
        assert_eq!(image_size.area(), 200);
        assert!(!image_size.is_empty());
        assert!(ImageSize::from([0, 3]).is_empty());
    }

    #[test]
    fn image_smoke() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 10,
                height: 20,
            },
            vec![0u8; 10 * 20 * 3],
        )?;
        assert_eq!(image.size().width, 10);
        assert_eq!(image.size().height, 20);
        assert_eq!(image.num_channels(), 3);
        Ok(())
    }

    #[test]
    fn image_wrong_data_length() {
        let res = Image::<u8, 1>::new([4, 4].into(), vec![0u8; 15]);
        assert_eq!(res, Err(ImageError::InvalidChannelShape(15, 16)));
    }

    #[test]
    fn image_get_pixel() -> Result<(), ImageError> {
        let image = Image::<u8, 2>::new([2, 2].into(), vec![0, 1, 2, 3, 4, 5, 6, 7])?;
        assert_eq!(*image.get_pixel(1, 0, 1)?, 3);
        assert_eq!(*image.get_pixel(0, 1, 0)?, 4);
        assert!(image.get_pixel(2, 0, 0).is_err());
        assert!(image.get_pixel(0, 0, 2).is_err());
        Ok(())
    }
}
