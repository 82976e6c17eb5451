use std::path::{Path, PathBuf};

use geopose_geometry::{Correspondence, CorrespondenceSet, Keypoint};
use geopose_image::{ops, Image};
use serde::{Deserialize, Serialize};

use crate::backend::{check_image_pair, MatchingBackend};
use crate::device::{select_device, AcceleratorProbe, Device, ExecutionMode};
use crate::error::{ConstructionError, InputContractError};

/// Raw output of a dense matcher: parallel arrays of matched points and confidences.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DenseMatches {
    /// Matched points in the first image.
    pub query: Vec<[f32; 2]>,
    /// Matched points in the second image.
    pub reference: Vec<[f32; 2]>,
    /// Per-match confidence.
    pub confidence: Vec<f32>,
}

/// A learned dense or semi-dense matcher (e.g. LoFTR) operating on
/// grayscale images normalized to `[0, 1]`.
pub trait DenseMatcherModel {
    /// Image sizes must be multiples of this stride.
    fn stride(&self) -> usize {
        8
    }

    /// Run the model on an image pair.
    fn forward(&mut self, query: &Image<f32, 1>, reference: &Image<f32, 1>) -> DenseMatches;
}

/// Provisions a [`DenseMatcherModel`]: probes accelerators and loads weights.
pub trait DenseModelLoader: AcceleratorProbe {
    /// The loaded model.
    type Model: DenseMatcherModel;

    /// Load the weights at `weights` onto `device`.
    fn load(&self, weights: &Path, device: Device) -> Result<Self::Model, ConstructionError>;
}

/// Configuration of a [`DenseMatcher`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseMatcherConfig {
    /// Path to the model weights, supplied by the resource-loading layer.
    pub weights_path: PathBuf,
    /// Requested execution mode.
    pub execution_mode: ExecutionMode,
    /// Internal acceptance cutoff, matches need a confidence strictly above it.
    pub min_confidence: f64,
}

impl Default for DenseMatcherConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("weights/outdoor_ds.ckpt"),
            execution_mode: ExecutionMode::Auto,
            min_confidence: 0.7,
        }
    }
}

/// [`MatchingBackend`] adapter around a learned dense matcher.
pub struct DenseMatcher<M: DenseMatcherModel> {
    model: M,
    device: Device,
    min_confidence: f64,
}

impl<M: DenseMatcherModel> DenseMatcher<M> {
    /// Provision the model: check the weights, select the device, load.
    ///
    /// The device is probed only here, never per call.
    pub fn new<L>(loader: &L, config: DenseMatcherConfig) -> Result<Self, ConstructionError>
    where
        L: DenseModelLoader<Model = M>,
    {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(ConstructionError::InvalidConfig(format!(
                "min_confidence {} is outside [0, 1]",
                config.min_confidence
            )));
        }
        if !config.weights_path.is_file() {
            return Err(ConstructionError::MissingResource(config.weights_path));
        }

        let device = select_device(config.execution_mode, loader)?;
        let model = loader.load(&config.weights_path, device)?;
        log::info!("Loaded dense matcher weights {}", config.weights_path.display());

        Ok(Self {
            model,
            device,
            min_confidence: config.min_confidence,
        })
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }
}

fn to_unit_f32(image: &Image<u8, 1>) -> Result<Image<f32, 1>, InputContractError> {
    let mut out = Image::from_size_val(image.size(), 0.0f32)?;
    ops::cast_and_scale(image, &mut out, 1.0 / 255.0)?;
    Ok(out)
}

impl<M: DenseMatcherModel> MatchingBackend for DenseMatcher<M> {
    fn name(&self) -> &str {
        "dense"
    }

    fn device(&self) -> Device {
        self.device
    }

    fn match_pair(
        &mut self,
        query: &Image<u8, 1>,
        reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError> {
        check_image_pair(query, reference, self.model.stride())?;

        let query_f32 = to_unit_f32(query)?;
        let reference_f32 = to_unit_f32(reference)?;
        let out = self.model.forward(&query_f32, &reference_f32);

        let n = out.query.len();
        if out.reference.len() != n || out.confidence.len() != n {
            log::warn!(
                "dense matcher returned {} / {} / {} points and confidences, truncating",
                n,
                out.reference.len(),
                out.confidence.len()
            );
        }

        let set: CorrespondenceSet = out
            .query
            .iter()
            .zip(out.reference.iter())
            .zip(out.confidence.iter())
            .filter(|(_, c)| f64::from(**c) > self.min_confidence)
            .filter_map(|((&q, &r), &c)| {
                Correspondence::new(Keypoint::from(q), Keypoint::from(r), f64::from(c)).ok()
            })
            .collect();

        log::debug!("{}: {} raw matches, {} accepted", self.name(), n, set.len());

        Ok(set)
    }
}
