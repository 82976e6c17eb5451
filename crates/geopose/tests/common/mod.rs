#![allow(dead_code)]

use std::cell::Cell;

use geopose::geometry::{
    CorrespondenceSet, FitFailure, FittedTransform, Mat33, ModelKind, RansacTransformSolver,
    TransformSolver,
};
use geopose::image::{Image, ImageSize};
use geopose::matching::{Device, InputContractError, MatchingBackend};

/// Backend returning a fixed correspondence set.
pub struct ScriptedBackend {
    pub set: CorrespondenceSet,
    pub calls: usize,
}

impl ScriptedBackend {
    pub fn new(set: CorrespondenceSet) -> Self {
        Self { set, calls: 0 }
    }
}

impl MatchingBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn match_pair(
        &mut self,
        _query: &Image<u8, 1>,
        _reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError> {
        self.calls += 1;
        Ok(self.set.clone())
    }
}

/// RANSAC solver counting its invocations.
#[derive(Default)]
pub struct CountingSolver {
    pub inner: RansacTransformSolver,
    pub calls: Cell<usize>,
}

impl TransformSolver for CountingSolver {
    fn solve(
        &self,
        set: &CorrespondenceSet,
        model_kind: ModelKind,
    ) -> Result<FittedTransform, FitFailure> {
        self.calls.set(self.calls.get() + 1);
        self.inner.solve(set, model_kind)
    }
}

pub fn blank_image() -> Image<u8, 1> {
    let size = ImageSize {
        width: 16,
        height: 16,
    };
    Image::new(size, vec![0; 256]).expect("valid image")
}

/// Scattered query points in a 640x480 frame.
pub fn query_points(n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|i| {
            let fi = i as f64;
            [
                320.0 + 280.0 * (fi * 0.71).sin(),
                240.0 + 200.0 * (fi * 1.37).cos(),
            ]
        })
        .collect()
}

pub fn apply_homography(h: &Mat33, p: &[f64; 2]) -> [f64; 2] {
    let x = h[0][0] * p[0] + h[0][1] * p[1] + h[0][2];
    let y = h[1][0] * p[0] + h[1][1] * p[1] + h[1][2];
    let w = h[2][0] * p[0] + h[2][1] * p[1] + h[2][2];
    [x / w, y / w]
}

pub fn set_from(query: &[[f64; 2]], reference: &[[f64; 2]], confidence: f64) -> CorrespondenceSet {
    let confidences = vec![confidence; query.len()];
    CorrespondenceSet::try_from_points(query, reference, &confidences).expect("valid correspondences")
}
