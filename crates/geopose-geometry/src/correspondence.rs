use serde::{Deserialize, Serialize};

/// Errors raised while building correspondences.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CorrespondenceError {
    /// The confidence is outside `[0, 1]` or NaN.
    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    /// A keypoint coordinate is NaN or infinite.
    #[error("Keypoint coordinates must be finite")]
    NonFiniteCoordinate,

    /// Parallel point and confidence arrays disagree in length.
    #[error("Length mismatch: {query} query points, {reference} reference points, {confidence} confidences")]
    LengthMismatch {
        /// Number of query points.
        query: usize,
        /// Number of reference points.
        reference: usize,
        /// Number of confidences.
        confidence: usize,
    },
}

/// A sub-pixel 2d coordinate in an image pixel grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Column coordinate.
    pub x: f64,
    /// Row coordinate.
    pub y: f64,
}

impl Keypoint {
    /// Create a keypoint.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The keypoint as an `[x, y]` array.
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Keypoint {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<[f32; 2]> for Keypoint {
    fn from(p: [f32; 2]) -> Self {
        Self::new(p[0] as f64, p[1] as f64)
    }
}

/// A matched pair of keypoints, one per image, with a confidence in `[0, 1]`.
///
/// The fields are private so that the confidence range and finiteness of the
/// coordinates hold for every value of this type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Correspondence {
    query: Keypoint,
    reference: Keypoint,
    confidence: f64,
}

impl Correspondence {
    /// Create a correspondence.
    ///
    /// # Errors
    ///
    /// Fails if `confidence` is not in `[0, 1]` or a coordinate is not finite.
    pub fn new(
        query: Keypoint,
        reference: Keypoint,
        confidence: f64,
    ) -> Result<Self, CorrespondenceError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CorrespondenceError::InvalidConfidence(confidence));
        }
        if !query.is_finite() || !reference.is_finite() {
            return Err(CorrespondenceError::NonFiniteCoordinate);
        }
        Ok(Self {
            query,
            reference,
            confidence,
        })
    }

    /// Keypoint in the query image.
    pub fn query(&self) -> Keypoint {
        self.query
    }

    /// Keypoint in the reference image.
    pub fn reference(&self) -> Keypoint {
        self.reference
    }

    /// Match confidence in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// An ordered sequence of correspondences.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CorrespondenceSet {
    items: Vec<Correspondence>,
}

impl CorrespondenceSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with room for `capacity` correspondences.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Build a set from parallel arrays of query points, reference points and confidences.
    pub fn try_from_points(
        query: &[[f64; 2]],
        reference: &[[f64; 2]],
        confidence: &[f64],
    ) -> Result<Self, CorrespondenceError> {
        if query.len() != reference.len() || query.len() != confidence.len() {
            return Err(CorrespondenceError::LengthMismatch {
                query: query.len(),
                reference: reference.len(),
                confidence: confidence.len(),
            });
        }
        query
            .iter()
            .zip(reference)
            .zip(confidence)
            .map(|((&q, &r), &c)| Correspondence::new(q.into(), r.into(), c))
            .collect()
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set holds no correspondence.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the correspondences in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence> {
        self.items.iter()
    }

    /// Append a correspondence.
    pub fn push(&mut self, correspondence: Correspondence) {
        self.items.push(correspondence);
    }

    /// The correspondences as a slice.
    pub fn as_slice(&self) -> &[Correspondence] {
        &self.items
    }

    /// Get the correspondence at `index`.
    pub fn get(&self, index: usize) -> Option<&Correspondence> {
        self.items.get(index)
    }

    /// New set holding the correspondences for which `keep` returns true, in order.
    pub fn retain_by<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Correspondence) -> bool,
    {
        self.items.iter().filter(|c| keep(c)).copied().collect()
    }

    /// Query keypoints as `[x, y]` arrays.
    pub fn query_points(&self) -> Vec<[f64; 2]> {
        self.items.iter().map(|c| c.query.to_array()).collect()
    }

    /// Reference keypoints as `[x, y]` arrays.
    pub fn reference_points(&self) -> Vec<[f64; 2]> {
        self.items.iter().map(|c| c.reference.to_array()).collect()
    }
}

impl FromIterator<Correspondence> for CorrespondenceSet {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Correspondence>> for CorrespondenceSet {
    fn from(items: Vec<Correspondence>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a CorrespondenceSet {
    type Item = &'a Correspondence;
    type IntoIter = std::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for CorrespondenceSet {
    type Item = Correspondence;
    type IntoIter = std::vec::IntoIter<Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
