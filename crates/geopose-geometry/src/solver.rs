use serde::{Deserialize, Serialize};

use crate::correspondence::CorrespondenceSet;
use crate::essential::{self, CandidateKind};
use crate::homography;
use crate::linalg::{self, Mat33, Vec3};
use crate::ransac::{self, Estimator, RansacError, RansacParams};

/// The geometric model fitted between the query and the reference image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Planar projective transform, valid for flat scenes or pure rotation.
    #[default]
    Homography,
    /// Relative rotation and translation direction through the essential matrix.
    Essential,
}

impl ModelKind {
    /// Size of the minimal sample of the model's solver.
    pub const fn sample_size(self) -> usize {
        match self {
            ModelKind::Homography => 4,
            ModelKind::Essential => 8,
        }
    }
}

/// Pinhole camera intrinsics shared by the query and the reference image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
    /// Principal point x in pixels.
    pub cx: f64,
    /// Principal point y in pixels.
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Map a pixel to normalized camera coordinates.
    pub fn normalize(&self, p: &[f64; 2]) -> [f64; 2] {
        [(p[0] - self.cx) / self.fx, (p[1] - self.cy) / self.fy]
    }

    /// Mean of the two focal lengths, used to convert pixel thresholds.
    pub fn mean_focal(&self) -> f64 {
        0.5 * (self.fx + self.fy)
    }

    /// Whether the focal lengths are positive and every value is finite.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx > 0.0
            && self.fy > 0.0
    }
}

/// Relative pose of the reference camera with respect to the query camera.
///
/// A point `X` in the query camera frame is `R * X + t` in the reference
/// camera frame. The translation has unit norm, monocular scale is unknown.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativePose {
    /// Rotation from the query to the reference camera frame.
    pub rotation: Mat33,
    /// Unit translation direction.
    pub translation: Vec3,
    /// Essential matrix the pose was decomposed from.
    pub essential: Mat33,
    /// Which of the four algebraic solutions won the cheirality vote.
    pub candidate: CandidateKind,
}

/// A fitted geometric transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Homography mapping query pixels to reference pixels, `H[2][2] == 1`.
    Homography(Mat33),
    /// Relative camera pose recovered from the essential matrix.
    RelativePose(RelativePose),
}

impl Transform {
    /// The model kind this transform belongs to.
    pub fn kind(&self) -> ModelKind {
        match self {
            Transform::Homography(_) => ModelKind::Homography,
            Transform::RelativePose(_) => ModelKind::Essential,
        }
    }

    /// The homography matrix, if this is a homography.
    pub fn as_homography(&self) -> Option<&Mat33> {
        match self {
            Transform::Homography(h) => Some(h),
            Transform::RelativePose(_) => None,
        }
    }

    /// The relative pose, if this is a relative pose.
    pub fn as_relative_pose(&self) -> Option<&RelativePose> {
        match self {
            Transform::Homography(_) => None,
            Transform::RelativePose(pose) => Some(pose),
        }
    }
}

/// A transform together with its support in the input correspondences.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedTransform {
    /// The fitted transform.
    pub transform: Transform,
    /// One entry per input correspondence, true for inliers.
    pub inlier_mask: Vec<bool>,
    /// Number of inliers.
    pub inlier_count: usize,
    /// Root mean square inlier error in pixels.
    pub rms_error: f64,
}

impl FittedTransform {
    /// Fraction of the input correspondences that are inliers.
    pub fn inlier_ratio(&self) -> f64 {
        if self.inlier_mask.is_empty() {
            return 0.0;
        }
        self.inlier_count as f64 / self.inlier_mask.len() as f64
    }
}

/// Why no consistent transform could be fitted.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FitFailure {
    /// Fewer correspondences than the minimal sample of the model.
    #[error("Need at least {required} correspondences, got {actual}")]
    TooFewCorrespondences {
        /// Minimal sample size.
        required: usize,
        /// Number of correspondences given.
        actual: usize,
    },

    /// All keypoints of one image lie on a line.
    #[error("All {0} keypoints are collinear")]
    Collinear(&'static str),

    /// No random sample produced a model.
    #[error("Every sample was degenerate")]
    DegenerateSamples,

    /// The best model did not gather enough inliers.
    #[error("Best model has {inliers} inliers, {required} required")]
    NoConsensus {
        /// Inliers of the best model.
        inliers: usize,
        /// Required inliers.
        required: usize,
    },

    /// No pose candidate places a majority of the inliers in front of both cameras.
    #[error("No pose candidate passes the cheirality check")]
    NoCheiralSolution,

    /// The essential model needs camera intrinsics.
    #[error("Camera intrinsics are required for the essential model")]
    MissingIntrinsics,
}

impl From<RansacError> for FitFailure {
    fn from(err: RansacError) -> Self {
        match err {
            RansacError::NotEnoughData { required, actual } => {
                FitFailure::TooFewCorrespondences { required, actual }
            }
            RansacError::DegenerateSamples => FitFailure::DegenerateSamples,
            RansacError::NoConsensus { best, required } => FitFailure::NoConsensus {
                inliers: best,
                required,
            },
        }
    }
}

/// Fits a geometric transform to a set of correspondences.
pub trait TransformSolver {
    /// Fit `model_kind` to `set`, rejecting outliers.
    ///
    /// The returned inlier mask has one entry per correspondence of `set`.
    fn solve(
        &self,
        set: &CorrespondenceSet,
        model_kind: ModelKind,
    ) -> Result<FittedTransform, FitFailure>;
}

impl<S: TransformSolver + ?Sized> TransformSolver for &S {
    fn solve(
        &self,
        set: &CorrespondenceSet,
        model_kind: ModelKind,
    ) -> Result<FittedTransform, FitFailure> {
        (**self).solve(set, model_kind)
    }
}

type PointPair = ([f64; 2], [f64; 2]);

// minimal samples with three points within `collinear_tolerance` pixels of a line are skipped
struct HomographyEstimator {
    collinear_tolerance: f64,
}

impl Estimator for HomographyEstimator {
    type Datum = PointPair;
    type Model = Mat33;

    const SAMPLE_SIZE: usize = 4;

    fn fit(&self, data: &[PointPair], sample: &[usize]) -> Option<Mat33> {
        let mut x1 = [[0.0; 2]; 4];
        let mut x2 = [[0.0; 2]; 4];
        for (k, &idx) in sample.iter().take(4).enumerate() {
            (x1[k], x2[k]) = data[idx];
        }
        homography::homography_4pt2d(&x1, &x2).ok()
    }

    fn residual(&self, model: &Mat33, datum: &PointPair) -> f64 {
        homography::homography_transfer_error(model, &datum.0, &datum.1)
    }

    fn is_degenerate(&self, data: &[PointPair], sample: &[usize]) -> bool {
        let x1: Vec<[f64; 2]> = sample.iter().map(|&i| data[i].0).collect();
        let x2: Vec<[f64; 2]> = sample.iter().map(|&i| data[i].1).collect();
        homography::is_collinear_sample_within(&x1, self.collinear_tolerance)
            || homography::is_collinear_sample_within(&x2, self.collinear_tolerance)
    }

    fn refit(&self, data: &[PointPair], inliers: &[usize]) -> Option<Mat33> {
        let (x1, x2): (Vec<_>, Vec<_>) = inliers.iter().map(|&i| data[i]).unzip();
        homography::homography_dlt(&x1, &x2).ok()
    }
}

// operates on normalized camera coordinates
struct EssentialEstimator;

impl Estimator for EssentialEstimator {
    type Datum = PointPair;
    type Model = Mat33;

    const SAMPLE_SIZE: usize = 8;

    fn fit(&self, data: &[PointPair], sample: &[usize]) -> Option<Mat33> {
        let (x1, x2): (Vec<_>, Vec<_>) = sample.iter().map(|&i| data[i]).unzip();
        essential::essential_8point(&x1, &x2).ok()
    }

    fn residual(&self, model: &Mat33, datum: &PointPair) -> f64 {
        essential::sampson_distance(model, &datum.0, &datum.1)
    }

    fn refit(&self, data: &[PointPair], inliers: &[usize]) -> Option<Mat33> {
        self.fit(data, inliers)
    }
}

/// Robust transform solver based on [`ransac::ransac`].
///
/// Degenerate inputs are reported as [`FitFailure`]:
/// - all query or all reference keypoints collinear,
/// - every minimal sample degenerate,
/// - fewer inliers than `max(ransac.min_inliers, sample size, ceil(min_inlier_ratio * n))`,
/// - for the essential model, no candidate pose with positive depth for a
///   strict majority of the inliers.
#[derive(Clone, Debug, PartialEq)]
pub struct RansacTransformSolver {
    /// Sampling parameters. The threshold is in pixels for both models.
    pub params: RansacParams,
    /// Minimum fraction of the correspondences that must be inliers.
    pub min_inlier_ratio: f64,
    /// Camera intrinsics, required by the essential model.
    pub intrinsics: Option<CameraIntrinsics>,
}

impl Default for RansacTransformSolver {
    fn default() -> Self {
        Self {
            params: RansacParams::default(),
            min_inlier_ratio: 0.25,
            intrinsics: None,
        }
    }
}

impl RansacTransformSolver {
    /// Create a solver.
    pub fn new(
        params: RansacParams,
        min_inlier_ratio: f64,
        intrinsics: Option<CameraIntrinsics>,
    ) -> Self {
        Self {
            params,
            min_inlier_ratio,
            intrinsics,
        }
    }

    fn required_inliers(&self, n: usize, sample_size: usize) -> usize {
        let by_ratio = (self.min_inlier_ratio.clamp(0.0, 1.0) * n as f64).ceil() as usize;
        self.params.min_inliers.max(sample_size).max(by_ratio)
    }

    fn solve_homography(&self, data: &[PointPair]) -> Result<FittedTransform, FitFailure> {
        let params = RansacParams {
            min_inliers: self.required_inliers(data.len(), HomographyEstimator::SAMPLE_SIZE),
            ..self.params
        };
        let estimator = HomographyEstimator {
            collinear_tolerance: self.params.threshold,
        };
        let res = ransac::ransac(&estimator, data, &params)?;

        let mut h = res.model;
        linalg::normalize_mat33_inplace(&mut h);

        Ok(FittedTransform {
            transform: Transform::Homography(h),
            inlier_mask: res.inliers,
            inlier_count: res.inlier_count,
            rms_error: res.rms,
        })
    }

    fn solve_essential(&self, data: &[PointPair]) -> Result<FittedTransform, FitFailure> {
        let k = match self.intrinsics {
            Some(k) if k.is_valid() => k,
            _ => return Err(FitFailure::MissingIntrinsics),
        };
        let focal = k.mean_focal();

        let normalized: Vec<PointPair> = data
            .iter()
            .map(|(q, r)| (k.normalize(q), k.normalize(r)))
            .collect();

        let params = RansacParams {
            threshold: self.params.threshold / focal,
            min_inliers: self.required_inliers(data.len(), EssentialEstimator::SAMPLE_SIZE),
            ..self.params
        };
        let res = ransac::ransac(&EssentialEstimator, &normalized, &params)?;

        let (x1, x2): (Vec<_>, Vec<_>) = normalized.into_iter().unzip();
        let candidates = essential::decompose_essential(&res.model);
        let (best, front) = essential::select_pose(&candidates, &x1, &x2, &res.inliers)
            .ok_or(FitFailure::NoCheiralSolution)?;

        log::debug!(
            "essential: candidate {:?} has {front}/{} inliers in front of both cameras",
            best.kind,
            res.inlier_count
        );

        if front * 2 <= res.inlier_count {
            return Err(FitFailure::NoCheiralSolution);
        }

        Ok(FittedTransform {
            transform: Transform::RelativePose(RelativePose {
                rotation: best.rotation,
                translation: best.translation,
                essential: res.model,
                candidate: best.kind,
            }),
            inlier_mask: res.inliers,
            inlier_count: res.inlier_count,
            rms_error: res.rms * focal,
        })
    }
}

// a model supported only by inliers along a line is not determined by them
fn check_inlier_spread(data: &[PointPair], mask: &[bool], tolerance: f64) -> Result<(), FitFailure> {
    let (query, reference): (Vec<_>, Vec<_>) = data
        .iter()
        .zip(mask)
        .filter(|(_, &inlier)| inlier)
        .map(|(pair, _)| *pair)
        .unzip();
    if linalg::is_collinear_set(&query, tolerance) {
        return Err(FitFailure::Collinear("query inlier"));
    }
    if linalg::is_collinear_set(&reference, tolerance) {
        return Err(FitFailure::Collinear("reference inlier"));
    }
    Ok(())
}

impl TransformSolver for RansacTransformSolver {
    fn solve(
        &self,
        set: &CorrespondenceSet,
        model_kind: ModelKind,
    ) -> Result<FittedTransform, FitFailure> {
        let n = set.len();
        let sample_size = model_kind.sample_size();
        if n < sample_size {
            return Err(FitFailure::TooFewCorrespondences {
                required: sample_size,
                actual: n,
            });
        }

        let query = set.query_points();
        let reference = set.reference_points();
        let tolerance = self.params.threshold;
        if linalg::is_collinear_set(&query, tolerance) {
            return Err(FitFailure::Collinear("query"));
        }
        if linalg::is_collinear_set(&reference, tolerance) {
            return Err(FitFailure::Collinear("reference"));
        }

        let data: Vec<PointPair> = query.into_iter().zip(reference).collect();
        let fitted = match model_kind {
            ModelKind::Homography => self.solve_homography(&data),
            ModelKind::Essential => self.solve_essential(&data),
        }?;
        check_inlier_spread(&data, &fitted.inlier_mask, tolerance)?;

        log::debug!(
            "{model_kind:?}: {}/{n} inliers, rms {:.3} px",
            fitted.inlier_count,
            fitted.rms_error
        );

        Ok(fitted)
    }
}
