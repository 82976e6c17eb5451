use geopose_features::{
    fast_feature_detector, match_descriptors, non_max_suppression, BriefExtractor, Descriptor,
    DESCRIPTOR_BITS,
};
use geopose_geometry::{Correspondence, CorrespondenceSet, Keypoint};
use geopose_image::Image;
use serde::{Deserialize, Serialize};

use crate::backend::{check_image_pair, MatchingBackend};
use crate::device::{select_device, CpuOnly, Device, ExecutionMode};
use crate::error::{ConstructionError, InputContractError};

/// Configuration of the [`ClassicalMatcher`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicalMatcherConfig {
    /// Intensity difference for the FAST segment test.
    pub fast_threshold: u8,
    /// Contiguous arc length of the FAST segment test.
    pub arc_length: u8,
    /// Minimum spacing of the kept corners in pixels.
    pub nms_radius: u32,
    /// Maximum number of corners per image.
    pub max_features: usize,
    /// BRIEF patch size in pixels.
    pub patch_size: usize,
    /// Seed of the BRIEF test pattern.
    pub seed: u64,
    /// Keep only mutual nearest neighbours.
    pub cross_check: bool,
    /// Lowe's ratio test bound, `None` to disable.
    pub max_ratio: Option<f32>,
    /// Internal acceptance cutoff, matches need a confidence strictly above it.
    pub min_confidence: f64,
    /// Requested execution mode. Only the CPU is supported.
    pub execution_mode: ExecutionMode,
}

impl Default for ClassicalMatcherConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            arc_length: 9,
            nms_radius: 5,
            max_features: 2000,
            patch_size: 31,
            seed: 0,
            cross_check: true,
            max_ratio: Some(0.8),
            min_confidence: 0.7,
            execution_mode: ExecutionMode::NonAccelerated,
        }
    }
}

/// Descriptor-and-match backend: FAST corners, BRIEF descriptors and
/// brute-force Hamming matching.
///
/// The confidence of a match is `1 - distance / 256`.
pub struct ClassicalMatcher {
    config: ClassicalMatcherConfig,
    extractor: BriefExtractor,
    device: Device,
}

impl ClassicalMatcher {
    /// Create the matcher.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::IncompatibleExecutionMode`] when acceleration is
    /// required and [`ConstructionError::InvalidConfig`] for out of range values.
    pub fn new(config: ClassicalMatcherConfig) -> Result<Self, ConstructionError> {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(ConstructionError::InvalidConfig(format!(
                "min_confidence {} is outside [0, 1]",
                config.min_confidence
            )));
        }
        if let Some(ratio) = config.max_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConstructionError::InvalidConfig(format!(
                    "max_ratio {ratio} is outside (0, 1]"
                )));
            }
        }
        if config.max_features == 0 {
            return Err(ConstructionError::InvalidConfig(
                "max_features must be positive".to_string(),
            ));
        }

        let device = select_device(config.execution_mode, &CpuOnly)?;
        let extractor = BriefExtractor::new(config.patch_size, config.seed);

        Ok(Self {
            config,
            extractor,
            device,
        })
    }

    /// The matcher configuration.
    pub fn config(&self) -> &ClassicalMatcherConfig {
        &self.config
    }

    fn describe(&self, image: &Image<u8, 1>) -> (Vec<[f32; 2]>, Vec<Descriptor>) {
        let corners = fast_feature_detector(image, self.config.fast_threshold, self.config.arc_length);
        let corners = non_max_suppression(&corners, self.config.nms_radius, self.config.max_features);
        self.extractor.compute(image, &corners)
    }
}

impl MatchingBackend for ClassicalMatcher {
    fn name(&self) -> &str {
        "fast-brief"
    }

    fn device(&self) -> Device {
        self.device
    }

    fn match_pair(
        &mut self,
        query: &Image<u8, 1>,
        reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError> {
        check_image_pair(query, reference, 1)?;

        let (kps_q, desc_q) = self.describe(query);
        let (kps_r, desc_r) = self.describe(reference);

        let matches = match_descriptors(
            &desc_q,
            &desc_r,
            None,
            self.config.cross_check,
            self.config.max_ratio,
        );

        let set: CorrespondenceSet = matches
            .iter()
            .filter_map(|m| {
                let confidence = 1.0 - m.distance as f64 / DESCRIPTOR_BITS as f64;
                if confidence <= self.config.min_confidence {
                    return None;
                }
                Correspondence::new(
                    Keypoint::from(kps_q[m.query_idx]),
                    Keypoint::from(kps_r[m.train_idx]),
                    confidence,
                )
                .ok()
            })
            .collect();

        log::debug!(
            "{}: {} / {} keypoints, {} matches, {} accepted",
            self.name(),
            kps_q.len(),
            kps_r.len(),
            matches.len(),
            set.len()
        );

        Ok(set)
    }
}
