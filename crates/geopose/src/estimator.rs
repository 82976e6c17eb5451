use geopose_geometry::{RansacTransformSolver, TransformSolver};
use geopose_image::{color::to_gray_u8, ChannelOrder, Image, ImageError};
use geopose_matching::{InputContractError, MatchingBackend};

use crate::config::EstimatorConfig;
use crate::error::{ConfigError, PoseError};
use crate::filter::filter_by_confidence;
use crate::gate::EvidenceGate;
use crate::result::{AbsentReason, EstimationResult, PoseEstimate};

/// Stages of one estimation call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EstimatorState {
    /// No call in progress.
    #[default]
    AwaitingInput,
    /// The backend is matching the image pair.
    Matching,
    /// Low confidence correspondences are being discarded.
    Filtering,
    /// The correspondence count is being checked.
    Gating,
    /// The transform solver is running.
    Solving,
    /// The call finished, with or without an estimate.
    Done,
}

/// Estimates the transform between a query and a reference image.
///
/// Each call runs `Matching -> Filtering -> Gating -> Solving -> Done`. Gating
/// and solving fail closed to `Done` with an [`EstimationResult::Absent`];
/// nothing is retried.
///
/// ```no_run
/// use geopose::{EstimatorConfig, PoseEstimator};
/// use geopose::image::{Image, ImageSize};
/// use geopose::matching::{ClassicalMatcher, ClassicalMatcherConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ClassicalMatcher::new(ClassicalMatcherConfig::default())?;
/// let mut estimator = PoseEstimator::new(backend, EstimatorConfig::default())?;
///
/// let size = ImageSize { width: 640, height: 480 };
/// let query = Image::<u8, 1>::from_size_val(size, 0)?;
/// let reference = Image::<u8, 1>::from_size_val(size, 0)?;
/// let result = estimator.estimate(&query, &reference)?;
/// println!("{result:?}");
/// # Ok(())
/// # }
/// ```
pub struct PoseEstimator<B, S = RansacTransformSolver> {
    backend: B,
    solver: S,
    config: EstimatorConfig,
    gate: EvidenceGate,
    state: EstimatorState,
}

impl<B: MatchingBackend> PoseEstimator<B> {
    /// Create an estimator with the RANSAC solver described by `config`.
    pub fn new(backend: B, config: EstimatorConfig) -> Result<Self, PoseError> {
        config.validate()?;
        let solver = config.solver();
        Ok(Self::assemble(backend, solver, config))
    }
}

impl<B: MatchingBackend, S: TransformSolver> PoseEstimator<B, S> {
    /// Create an estimator with a custom transform solver.
    pub fn with_solver(backend: B, solver: S, config: EstimatorConfig) -> Result<Self, PoseError> {
        config.validate()?;
        Ok(Self::assemble(backend, solver, config))
    }

    fn assemble(backend: B, solver: S, config: EstimatorConfig) -> Self {
        let gate = EvidenceGate::new(config.min_matches);
        Self {
            backend,
            solver,
            config,
            gate,
            state: EstimatorState::AwaitingInput,
        }
    }

    /// The state reached by the last call.
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// The configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// The matching backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the estimator and return the matching backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Estimate the transform from `query` to `reference` with the configured
    /// `min_matches` and `confidence_threshold`.
    ///
    /// Color images are converted to grayscale with the configured channel
    /// order. Errors are reserved for input contract violations; routine
    /// failures are reported as [`EstimationResult::Absent`].
    pub fn estimate<const C: usize>(
        &mut self,
        query: &Image<u8, C>,
        reference: &Image<u8, C>,
    ) -> Result<EstimationResult, PoseError> {
        let gate = self.gate;
        let threshold = self.config.confidence_threshold;
        self.run(query, reference, gate, threshold)
    }

    /// Estimate the transform with per-call evidence requirements.
    ///
    /// `min_matches` must be at least 1 and is raised to the floor of
    /// [`crate::gate::MIN_CORRESPONDENCES`]. `confidence_threshold` must be in `[0, 1)`.
    pub fn estimate_pose<const C: usize>(
        &mut self,
        query: &Image<u8, C>,
        reference: &Image<u8, C>,
        min_matches: usize,
        confidence_threshold: f64,
    ) -> Result<EstimationResult, PoseError> {
        if min_matches == 0 {
            return Err(ConfigError::MinMatches(min_matches).into());
        }
        if !(0.0..1.0).contains(&confidence_threshold) {
            return Err(ConfigError::ConfidenceThreshold(confidence_threshold).into());
        }

        // reuse the configured gate so its floor warning is not repeated
        let gate = if min_matches == self.config.min_matches {
            self.gate
        } else {
            EvidenceGate::new(min_matches)
        };
        self.run(query, reference, gate, confidence_threshold)
    }

    fn transition(&mut self, next: EstimatorState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn run<const C: usize>(
        &mut self,
        query: &Image<u8, C>,
        reference: &Image<u8, C>,
        gate: EvidenceGate,
        confidence_threshold: f64,
    ) -> Result<EstimationResult, PoseError> {
        self.transition(EstimatorState::AwaitingInput);
        let result = self.run_stages(query, reference, gate, confidence_threshold);
        self.transition(EstimatorState::Done);
        result
    }

    fn run_stages<const C: usize>(
        &mut self,
        query: &Image<u8, C>,
        reference: &Image<u8, C>,
        gate: EvidenceGate,
        confidence_threshold: f64,
    ) -> Result<EstimationResult, PoseError> {
        self.transition(EstimatorState::Matching);
        let order = self.config.channel_order;
        let query_gray = grayscale(query, order)?;
        let reference_gray = grayscale(reference, order)?;
        let raw = self.backend.match_pair(&query_gray, &reference_gray)?;

        self.transition(EstimatorState::Filtering);
        let filtered = filter_by_confidence(&raw, confidence_threshold);
        log::debug!(
            "{}: {} raw correspondences, {} above confidence {}",
            self.backend.name(),
            raw.len(),
            filtered.len(),
            confidence_threshold
        );

        self.transition(EstimatorState::Gating);
        if !gate.check(&filtered) {
            let reason = AbsentReason::InsufficientEvidence {
                raw: raw.len(),
                filtered: filtered.len(),
                required: gate.minimum(),
            };
            log::debug!("No estimate: {reason}");
            return Ok(EstimationResult::Absent(reason));
        }

        self.transition(EstimatorState::Solving);
        match self.solver.solve(&filtered, self.config.model_kind) {
            Ok(fitted) => {
                let estimate = PoseEstimate::from_fitted(fitted, raw.len());
                log::debug!(
                    "Estimated {:?}: {}/{} inliers, rms {:.3} px",
                    estimate.transform.kind(),
                    estimate.inlier_count,
                    filtered.len(),
                    estimate.rms_error
                );
                Ok(EstimationResult::Estimated(estimate))
            }
            Err(failure) => {
                let reason = AbsentReason::DegenerateFit(failure);
                log::debug!("No estimate: {reason}");
                Ok(EstimationResult::Absent(reason))
            }
        }
    }
}

fn grayscale<const C: usize>(
    image: &Image<u8, C>,
    order: ChannelOrder,
) -> Result<Image<u8, 1>, InputContractError> {
    to_gray_u8(image, order).map_err(|err| match err {
        ImageError::UnsupportedChannels(channels) => InputContractError::UnsupportedChannels(channels),
        err => InputContractError::Image(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopose_geometry::{Correspondence, CorrespondenceSet, Keypoint};
    use geopose_image::ImageSize;
    use geopose_matching::Device;

    // returns a fixed set and records the first query pixel it saw
    struct FixedBackend {
        set: CorrespondenceSet,
        first_pixel: Option<u8>,
    }

    impl MatchingBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn device(&self) -> Device {
            Device::Cpu
        }

        fn match_pair(
            &mut self,
            query: &Image<u8, 1>,
            _reference: &Image<u8, 1>,
        ) -> Result<CorrespondenceSet, InputContractError> {
            self.first_pixel = query.as_slice().first().copied();
            Ok(self.set.clone())
        }
    }

    fn shifted_grid(n: usize, confidence: f64) -> CorrespondenceSet {
        (0..n)
            .filter_map(|i| {
                let x = (i % 5) as f64 * 20.0 + (i / 5) as f64;
                let y = (i / 5) as f64 * 25.0 + (i % 3) as f64;
                let q = Keypoint::new(x, y);
                let r = Keypoint::new(x + 3.0, y - 2.0);
                Correspondence::new(q, r, confidence).ok()
            })
            .collect()
    }

    fn backend(set: CorrespondenceSet) -> FixedBackend {
        FixedBackend {
            set,
            first_pixel: None,
        }
    }

    fn image<const C: usize>(val: u8) -> Result<Image<u8, C>, ImageError> {
        Image::from_size_val(
            ImageSize {
                width: 8,
                height: 8,
            },
            val,
        )
    }

    #[test]
    fn estimate_reaches_done() -> Result<(), Box<dyn std::error::Error>> {
        let mut estimator = PoseEstimator::new(backend(shifted_grid(20, 0.9)), EstimatorConfig::default())?;
        assert_eq!(estimator.state(), EstimatorState::AwaitingInput);

        let img = image::<1>(0)?;
        let result = estimator.estimate(&img, &img)?;
        assert_eq!(estimator.state(), EstimatorState::Done);

        let estimate = result.estimate().ok_or("no estimate")?;
        assert_eq!(estimate.inlier_count, 20);
        assert_eq!(estimate.raw_matches, 20);
        Ok(())
    }

    #[test]
    fn low_confidence_is_insufficient() -> Result<(), Box<dyn std::error::Error>> {
        let mut estimator = PoseEstimator::new(backend(shifted_grid(20, 0.5)), EstimatorConfig::default())?;
        let img = image::<1>(0)?;
        let result = estimator.estimate(&img, &img)?;
        assert_eq!(
            result,
            EstimationResult::Absent(AbsentReason::InsufficientEvidence {
                raw: 20,
                filtered: 0,
                required: 10
            })
        );
        assert_eq!(estimator.state(), EstimatorState::Done);

        // the per-call threshold overrides the configured one
        let result = estimator.estimate_pose(&img, &img, 10, 0.4)?;
        assert!(result.is_estimated());
        Ok(())
    }

    #[test]
    fn estimate_pose_validates_arguments() -> Result<(), Box<dyn std::error::Error>> {
        let mut estimator = PoseEstimator::new(backend(shifted_grid(20, 0.9)), EstimatorConfig::default())?;
        let img = image::<1>(0)?;
        assert!(matches!(
            estimator.estimate_pose(&img, &img, 0, 0.5),
            Err(PoseError::Config(ConfigError::MinMatches(0)))
        ));
        assert!(matches!(
            estimator.estimate_pose(&img, &img, 10, 1.0),
            Err(PoseError::Config(ConfigError::ConfidenceThreshold(_)))
        ));
        assert_eq!(estimator.state(), EstimatorState::AwaitingInput);
        Ok(())
    }

    #[test]
    fn color_input_uses_channel_order() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 1,
            height: 1,
        };
        let blue = Image::<u8, 3>::new(size, vec![0, 0, 255])?;

        let config = EstimatorConfig {
            channel_order: ChannelOrder::Bgr,
            ..Default::default()
        };
        let mut estimator = PoseEstimator::new(backend(CorrespondenceSet::new()), config)?;
        estimator.estimate(&blue, &blue)?;
        // read as bgr the pixel is red
        assert_eq!(estimator.backend().first_pixel, Some(76));

        let mut estimator = PoseEstimator::new(backend(CorrespondenceSet::new()), EstimatorConfig::default())?;
        estimator.estimate(&blue, &blue)?;
        assert_eq!(estimator.into_backend().first_pixel, Some(28));
        Ok(())
    }

    #[test]
    fn unsupported_channels_violate_contract() -> Result<(), Box<dyn std::error::Error>> {
        let mut estimator = PoseEstimator::new(backend(shifted_grid(20, 0.9)), EstimatorConfig::default())?;
        let img = image::<2>(0)?;
        assert!(matches!(
            estimator.estimate(&img, &img),
            Err(PoseError::InputContract(InputContractError::UnsupportedChannels(2)))
        ));
        assert_eq!(estimator.state(), EstimatorState::Done);
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EstimatorConfig {
            min_inlier_ratio: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            PoseEstimator::new(backend(CorrespondenceSet::new()), config),
            Err(PoseError::Config(ConfigError::MinInlierRatio(_)))
        ));
    }
}
