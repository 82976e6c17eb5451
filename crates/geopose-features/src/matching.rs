/// A match between two descriptor sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the first (query) descriptor set.
    pub query_idx: usize,
    /// Index into the second (train) descriptor set.
    pub train_idx: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// Number of differing bits between two descriptors.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

// nearest and second nearest distance seen so far, ties keep the first index
#[derive(Clone, Copy)]
struct Nearest {
    index: usize,
    best: u32,
    second: u32,
}

impl Nearest {
    const EMPTY: Self = Self {
        index: 0,
        best: u32::MAX,
        second: u32::MAX,
    };

    fn offer(&mut self, index: usize, distance: u32) {
        if distance < self.best {
            self.second = self.best;
            self.best = distance;
            self.index = index;
        } else if distance < self.second {
            self.second = distance;
        }
    }

    fn passes_ratio(&self, ratio: f32) -> bool {
        let second = (self.second as f32).max(f32::EPSILON);
        (self.best as f32) / second < ratio
    }
}

/// Brute-force nearest neighbour matching of binary descriptors.
///
/// Every query descriptor is paired with its nearest train descriptor. The pair
/// is dropped when its distance exceeds `max_distance`, when `cross_check` is set
/// and the two are not mutual nearest neighbours, or when `max_ratio` is below 1
/// and the nearest distance is not clearly smaller than the second nearest
/// (`best / second < max_ratio`).
///
/// Matches are returned in query order.
pub fn match_descriptors<const N: usize>(
    query: &[[u8; N]],
    train: &[[u8; N]],
    max_distance: Option<u32>,
    cross_check: bool,
    max_ratio: Option<f32>,
) -> Vec<DescriptorMatch> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let mut forward = vec![Nearest::EMPTY; query.len()];
    let mut backward = vec![Nearest::EMPTY; train.len()];
    for (qi, dq) in query.iter().enumerate() {
        for (ti, dt) in train.iter().enumerate() {
            let distance = hamming_distance(dq, dt);
            forward[qi].offer(ti, distance);
            backward[ti].offer(qi, distance);
        }
    }

    let ratio = max_ratio.filter(|r| *r < 1.0 && train.len() > 1);

    forward
        .iter()
        .enumerate()
        .filter(|(_, nn)| max_distance.map_or(true, |d| nn.best <= d))
        .filter(|(qi, nn)| !cross_check || backward[nn.index].index == *qi)
        .filter(|(_, nn)| ratio.map_or(true, |r| nn.passes_ratio(r)))
        .map(|(qi, nn)| DescriptorMatch {
            query_idx: qi,
            train_idx: nn.index,
            distance: nn.best,
        })
        .collect()
}
