use geopose_geometry::{FitFailure, FittedTransform, Transform};
use geopose_image::ImageSize;

use crate::georef::{self, FieldOfView};

/// A fitted transform between the query and the reference image.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseEstimate {
    /// The fitted transform.
    pub transform: Transform,
    /// One entry per filtered correspondence, true for inliers.
    pub inlier_mask: Vec<bool>,
    /// Number of inliers.
    pub inlier_count: usize,
    /// Inliers over filtered correspondences, a quality signal.
    pub inlier_ratio: f64,
    /// Root mean square inlier error in pixels.
    pub rms_error: f64,
    /// Correspondences returned by the backend before filtering.
    pub raw_matches: usize,
}

impl PoseEstimate {
    pub(crate) fn from_fitted(fitted: FittedTransform, raw_matches: usize) -> Self {
        let inlier_ratio = fitted.inlier_ratio();
        Self {
            transform: fitted.transform,
            inlier_mask: fitted.inlier_mask,
            inlier_count: fitted.inlier_count,
            inlier_ratio,
            rms_error: fitted.rms_error,
            raw_matches,
        }
    }

    /// Footprint of a `query_size` image in the reference image.
    ///
    /// Only defined for homographies. `None` for a relative pose or when the
    /// footprint reaches the horizon.
    pub fn field_of_view(&self, query_size: ImageSize) -> Option<FieldOfView> {
        self.transform
            .as_homography()
            .and_then(|h| georef::field_of_view(h, query_size))
    }
}

/// Why no estimate was produced. Both reasons are routine outcomes.
#[derive(Clone, Debug, PartialEq)]
pub enum AbsentReason {
    /// Too few correspondences survived the confidence filter.
    InsufficientEvidence {
        /// Correspondences returned by the backend.
        raw: usize,
        /// Correspondences left after filtering.
        filtered: usize,
        /// Required number of correspondences.
        required: usize,
    },
    /// The solver found no consistent model.
    DegenerateFit(FitFailure),
}

impl std::fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbsentReason::InsufficientEvidence {
                raw,
                filtered,
                required,
            } => write!(
                f,
                "insufficient evidence: {filtered} of {raw} correspondences kept, {required} required"
            ),
            AbsentReason::DegenerateFit(failure) => write!(f, "degenerate fit: {failure}"),
        }
    }
}

/// Outcome of one estimation call.
#[derive(Clone, Debug, PartialEq)]
pub enum EstimationResult {
    /// A transform was fitted.
    Estimated(PoseEstimate),
    /// No transform, with the reason.
    Absent(AbsentReason),
}

impl EstimationResult {
    /// The estimate, if any.
    pub fn estimate(&self) -> Option<&PoseEstimate> {
        match self {
            EstimationResult::Estimated(estimate) => Some(estimate),
            EstimationResult::Absent(_) => None,
        }
    }

    /// The absence reason, if any.
    pub fn absent_reason(&self) -> Option<&AbsentReason> {
        match self {
            EstimationResult::Estimated(_) => None,
            EstimationResult::Absent(reason) => Some(reason),
        }
    }

    /// Returns true if a transform was fitted.
    pub fn is_estimated(&self) -> bool {
        matches!(self, EstimationResult::Estimated(_))
    }

    /// Returns true for [`AbsentReason::InsufficientEvidence`].
    pub fn is_insufficient_evidence(&self) -> bool {
        matches!(
            self,
            EstimationResult::Absent(AbsentReason::InsufficientEvidence { .. })
        )
    }

    /// Returns true for [`AbsentReason::DegenerateFit`].
    pub fn is_degenerate_fit(&self) -> bool {
        matches!(self, EstimationResult::Absent(AbsentReason::DegenerateFit(_)))
    }

    /// Convert into an `Option`, dropping the reason.
    pub fn into_estimate(self) -> Option<PoseEstimate> {
        match self {
            EstimationResult::Estimated(estimate) => Some(estimate),
            EstimationResult::Absent(_) => None,
        }
    }
}
