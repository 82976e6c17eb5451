use std::path::PathBuf;

use geopose_image::{ImageError, ImageSize};

use crate::device::{Device, ExecutionMode};

/// Which image of a pair an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageRole {
    /// The live camera frame.
    Query,
    /// The geo-referenced reference image.
    Reference,
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRole::Query => write!(f, "query"),
            ImageRole::Reference => write!(f, "reference"),
        }
    }
}

/// A backend could not be initialized.
#[derive(thiserror::Error, Debug)]
pub enum ConstructionError {
    /// A resource such as a model weights file does not exist.
    #[error("Missing resource: {0}")]
    MissingResource(PathBuf),

    /// The requested execution mode is not available on this machine or backend.
    #[error("Execution mode {requested:?} is not available, only {available:?}")]
    IncompatibleExecutionMode {
        /// The requested execution mode.
        requested: ExecutionMode,
        /// The device that is available.
        available: Device,
    },

    /// The model could not be loaded.
    #[error("Failed to load the model: {0}")]
    ModelLoad(String),

    /// The backend configuration is invalid.
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),
}

/// The images handed to a backend violate its input contract.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum InputContractError {
    /// The image has no pixels.
    #[error("The {role} image is empty ({size})")]
    EmptyImage {
        /// Which image.
        role: ImageRole,
        /// Its size.
        size: ImageSize,
    },

    /// The image has a channel count that cannot be converted to grayscale.
    #[error("Unsupported number of channels: {0}")]
    UnsupportedChannels(usize),

    /// The image size is not a multiple of the model stride.
    #[error("The {role} image size {size} is not divisible by the model stride {stride}")]
    NotDivisible {
        /// Which image.
        role: ImageRole,
        /// Its size.
        size: ImageSize,
        /// The required stride.
        stride: usize,
    },

    /// An image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),
}
