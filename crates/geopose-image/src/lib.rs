#![deny(missing_docs)]
//! Image types and pixel conversions for the geopose matching pipeline

/// The `Image` container.
pub mod image;

/// Error types for the image module.
pub mod error;

/// Color space conversions to grayscale.
pub mod color;

/// Pixel-wise image operations.
pub mod ops;

/// Geometric image warping.
pub mod warp;

pub use crate::color::ChannelOrder;
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
