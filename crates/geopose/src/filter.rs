use geopose_geometry::CorrespondenceSet;

/// Keep the correspondences with a confidence strictly above `threshold`.
///
/// The relative order is preserved and the input is left untouched.
/// Filtering twice with the same or a lower threshold changes nothing.
pub fn filter_by_confidence(set: &CorrespondenceSet, threshold: f64) -> CorrespondenceSet {
    set.retain_by(|c| c.confidence() > threshold)
}

/// Confidence filter stage with a fixed threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceFilter {
    threshold: f64,
}

impl ConfidenceFilter {
    /// Create a filter.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The confidence threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply [`filter_by_confidence`].
    pub fn apply(&self, set: &CorrespondenceSet) -> CorrespondenceSet {
        filter_by_confidence(set, self.threshold)
    }
}
