use std::path::Path;

use geopose_geometry::{CameraIntrinsics, ModelKind, RansacParams, RansacTransformSolver};
use geopose_image::ChannelOrder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration of a [`crate::PoseEstimator`].
///
/// Every field has a default, so a JSON document only needs the fields it
/// overrides:
///
/// ```
/// use geopose::{EstimatorConfig, ModelKind};
///
/// let config = EstimatorConfig::from_json_str(r#"{ "min_matches": 20 }"#).unwrap();
/// assert_eq!(config.min_matches, 20);
/// assert_eq!(config.model_kind, ModelKind::Homography);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Minimum number of correspondences surviving the confidence filter.
    pub min_matches: usize,
    /// Correspondences need a confidence strictly above this value.
    pub confidence_threshold: f64,
    /// The model fitted between the two images.
    pub model_kind: ModelKind,
    /// Channel order of 3 and 4 channel input images.
    pub channel_order: ChannelOrder,
    /// Camera intrinsics, required for [`ModelKind::Essential`].
    pub intrinsics: Option<CameraIntrinsics>,
    /// Random sample consensus parameters.
    pub ransac: RansacParams,
    /// Minimum fraction of the filtered correspondences that must be inliers.
    pub min_inlier_ratio: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_matches: 10,
            confidence_threshold: 0.7,
            model_kind: ModelKind::Homography,
            channel_order: ChannelOrder::Rgb,
            intrinsics: None,
            ransac: RansacParams::default(),
            min_inlier_ratio: 0.25,
        }
    }
}

impl EstimatorConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_matches == 0 {
            return Err(ConfigError::MinMatches(self.min_matches));
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ConfidenceThreshold(self.confidence_threshold));
        }

        let ransac = &self.ransac;
        if !(ransac.threshold.is_finite() && ransac.threshold > 0.0) {
            return Err(ConfigError::Ransac(format!(
                "threshold must be positive, got {}",
                ransac.threshold
            )));
        }
        if ransac.max_iterations == 0 {
            return Err(ConfigError::Ransac(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(ransac.confidence > 0.0 && ransac.confidence < 1.0) {
            return Err(ConfigError::Ransac(format!(
                "confidence must be in (0, 1), got {}",
                ransac.confidence
            )));
        }

        if !(0.0..=1.0).contains(&self.min_inlier_ratio) {
            return Err(ConfigError::MinInlierRatio(self.min_inlier_ratio));
        }

        if self.model_kind == ModelKind::Essential
            && !self.intrinsics.is_some_and(|k| k.is_valid())
        {
            return Err(ConfigError::MissingIntrinsics);
        }

        Ok(())
    }

    /// The transform solver described by this configuration.
    pub fn solver(&self) -> RansacTransformSolver {
        RansacTransformSolver::new(self.ransac, self.min_inlier_ratio, self.intrinsics)
    }
}
