/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the source and destination sizes differ.
    #[error("Invalid image size: src ({0}x{1}) does not match dst ({2}x{3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when a pixel is requested outside of the image.
    #[error("Pixel ({0}, {1}, channel {2}) is out of bounds")]
    PixelIndexOutOfBounds(usize, usize, usize),

    /// Error when the number of channels cannot be converted.
    #[error("Unsupported number of channels: {0}")]
    UnsupportedChannels(usize),

    /// Error when a geometric transform cannot be inverted.
    #[error("Transform matrix is not invertible")]
    NonInvertibleTransform,

    /// Error when casting a value between pixel types fails.
    #[error("Failed to cast image data")]
    CastError,
}
