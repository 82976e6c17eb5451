use geopose_geometry::CorrespondenceSet;
use geopose_image::Image;

use crate::device::Device;
use crate::error::{ImageRole, InputContractError};

/// Finds candidate correspondences between a query and a reference image.
///
/// Implementations may keep long-lived resources (model weights, an
/// accelerator context) that are provisioned when the backend is built. A
/// constructed backend always attempts matching: the only per-call failures
/// are violations of its input contract.
///
/// `match_pair` takes `&mut self`, so a backend instance serves one match at
/// a time. Use one instance per worker for concurrency.
pub trait MatchingBackend {
    /// Short human readable name of the backend.
    fn name(&self) -> &str;

    /// The device selected at construction.
    fn device(&self) -> Device;

    /// Match two grayscale images.
    ///
    /// Returns the correspondences that pass the backend's own acceptance
    /// logic, possibly none. Query keypoints are in query pixels and
    /// reference keypoints in reference pixels.
    fn match_pair(
        &mut self,
        query: &Image<u8, 1>,
        reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError>;
}

impl<B: MatchingBackend + ?Sized> MatchingBackend for &mut B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn device(&self) -> Device {
        (**self).device()
    }

    fn match_pair(
        &mut self,
        query: &Image<u8, 1>,
        reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError> {
        (**self).match_pair(query, reference)
    }
}

impl<B: MatchingBackend + ?Sized> MatchingBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn device(&self) -> Device {
        (**self).device()
    }

    fn match_pair(
        &mut self,
        query: &Image<u8, 1>,
        reference: &Image<u8, 1>,
    ) -> Result<CorrespondenceSet, InputContractError> {
        (**self).match_pair(query, reference)
    }
}

/// Check that neither image is empty and that both sizes are multiples of `stride`.
pub fn check_image_pair(
    query: &Image<u8, 1>,
    reference: &Image<u8, 1>,
    stride: usize,
) -> Result<(), InputContractError> {
    for (role, image) in [(ImageRole::Query, query), (ImageRole::Reference, reference)] {
        let size = image.size();
        if size.is_empty() {
            return Err(InputContractError::EmptyImage { role, size });
        }
        if stride > 1 && (size.width % stride != 0 || size.height % stride != 0) {
            return Err(InputContractError::NotDivisible { role, size, stride });
        }
    }
    Ok(())
}
