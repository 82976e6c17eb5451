#![deny(missing_docs)]
//! # geopose
//!
//! Pose estimation of a camera frame against a geo-referenced reference
//! image, such as an orthophoto.
//!
//! A [`PoseEstimator`] runs a [`matching::MatchingBackend`] on the image pair,
//! drops low confidence correspondences, checks that enough evidence is left
//! and fits a homography or a relative pose with RANSAC. Featureless terrain
//! and inconsistent matches are routine, so they come back as
//! [`EstimationResult::Absent`] rather than as errors.
//!
//! ```no_run
//! use geopose::{EstimationResult, EstimatorConfig, PoseEstimator};
//! use geopose::image::{Image, ImageSize};
//! use geopose::matching::{ClassicalMatcher, ClassicalMatcherConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EstimatorConfig::from_json_str(r#"{ "min_matches": 15 }"#)?;
//! let backend = ClassicalMatcher::new(ClassicalMatcherConfig::default())?;
//! let mut estimator = PoseEstimator::new(backend, config)?;
//!
//! let size = ImageSize { width: 640, height: 480 };
//! let frame = Image::<u8, 3>::from_size_val(size, 0)?;
//! let map = Image::<u8, 3>::from_size_val(size, 0)?;
//! match estimator.estimate(&frame, &map)? {
//!     EstimationResult::Estimated(estimate) => println!("{:?}", estimate.transform),
//!     EstimationResult::Absent(reason) => println!("no pose: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use geopose_image as image;

#[doc(inline)]
pub use geopose_features as features;

#[doc(inline)]
pub use geopose_geometry as geometry;

#[doc(inline)]
pub use geopose_matching as matching;

/// Estimator configuration.
pub mod config;

/// Error types.
pub mod error;

/// The pose estimation state machine.
pub mod estimator;

/// Confidence filtering of correspondences.
pub mod filter;

/// Minimum-evidence gate.
pub mod gate;

/// Field of view and geo-referencing helpers.
pub mod georef;

/// Estimation results.
pub mod result;

pub use config::EstimatorConfig;
pub use error::{ConfigError, PoseError};
pub use estimator::{EstimatorState, PoseEstimator};
pub use filter::{filter_by_confidence, ConfidenceFilter};
pub use gate::{EvidenceGate, MIN_CORRESPONDENCES};
pub use geopose_geometry::{CameraIntrinsics, ModelKind, RansacParams, Transform};
pub use georef::{FieldOfView, GeoBoundingBox, LatLon, RotatedRaster};
pub use result::{AbsentReason, EstimationResult, PoseEstimate};
