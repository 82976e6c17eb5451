use geopose_geometry::CorrespondenceSet;

/// Fewest correspondences that determine a planar or epipolar model.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Minimum-evidence gate in front of the transform solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvidenceGate {
    minimum: usize,
}

impl EvidenceGate {
    /// Create a gate requiring `max(min_matches, MIN_CORRESPONDENCES)` correspondences.
    pub fn new(min_matches: usize) -> Self {
        if min_matches < MIN_CORRESPONDENCES {
            log::warn!(
                "min_matches {min_matches} is below the floor of {MIN_CORRESPONDENCES}, using {MIN_CORRESPONDENCES}"
            );
        }
        Self {
            minimum: min_matches.max(MIN_CORRESPONDENCES),
        }
    }

    /// The effective minimum.
    pub fn minimum(&self) -> usize {
        self.minimum
    }

    /// Whether `set` holds enough correspondences to attempt a fit.
    pub fn check(&self, set: &CorrespondenceSet) -> bool {
        set.len() >= self.minimum
    }
}
