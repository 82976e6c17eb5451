use geopose_matching::{ConstructionError, InputContractError};

/// An estimator configuration is invalid.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// `min_matches` must be at least one.
    #[error("min_matches must be at least 1, got {0}")]
    MinMatches(usize),

    /// `confidence_threshold` must be finite and in `[0, 1)`.
    #[error("confidence_threshold must be in [0, 1), got {0}")]
    ConfidenceThreshold(f64),

    /// The RANSAC parameters are out of range.
    #[error("Invalid RANSAC parameters: {0}")]
    Ransac(String),

    /// `min_inlier_ratio` must be in `[0, 1]`.
    #[error("min_inlier_ratio must be in [0, 1], got {0}")]
    MinInlierRatio(f64),

    /// The essential model needs valid camera intrinsics.
    #[error("The essential model requires positive, finite camera intrinsics")]
    MissingIntrinsics,

    /// The configuration could not be parsed.
    #[error("Failed to parse the configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("Failed to read the configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// A hard failure of the pose estimation engine.
///
/// Expected outcomes such as insufficient evidence or a degenerate fit are
/// not errors, see [`crate::EstimationResult`].
#[derive(thiserror::Error, Debug)]
pub enum PoseError {
    /// A matching backend could not be constructed.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// The input images violate the backend input contract.
    #[error(transparent)]
    InputContract(#[from] InputContractError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
