//! Generic, model-agnostic random sample consensus.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] with the data and
//! [`RansacParams`]. Sampling uses a seeded [`StdRng`] so a fixed seed gives
//! bit-identical results.

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters for RANSAC model estimation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Inlier threshold, in the square-root units of [`Estimator::residual`] (pixels).
    pub threshold: f64,
    /// Desired probability that at least one sample is outlier-free.
    pub confidence: f64,
    /// Minimum number of inliers required for acceptance, raised to the sample size.
    pub min_inliers: usize,
    /// Optional RNG seed for deterministic runs.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            threshold: 2.0,
            confidence: 0.999,
            min_inliers: 0,
            random_seed: Some(0),
        }
    }
}

/// Result of a RANSAC model fit.
#[derive(Clone, Debug, PartialEq)]
pub struct RansacResult<M> {
    /// Estimated model.
    pub model: M,
    /// Per-datum inlier mask.
    pub inliers: Vec<bool>,
    /// Total inlier count.
    pub inlier_count: usize,
    /// Root mean square of the inlier residuals, in threshold units.
    pub rms: f64,
    /// Number of iterations performed.
    pub iterations: usize,
}

/// Errors returned by [`ransac`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RansacError {
    /// Fewer data than the minimal sample.
    #[error("Need at least {required} data points, got {actual}")]
    NotEnoughData {
        /// Minimal sample size.
        required: usize,
        /// Number of data points given.
        actual: usize,
    },

    /// Every drawn sample was degenerate or could not be fitted.
    #[error("Every sample was degenerate")]
    DegenerateSamples,

    /// The best model did not gather enough inliers.
    #[error("Best model has {best} inliers, {required} required")]
    NoConsensus {
        /// Inliers of the best model.
        best: usize,
        /// Required inliers.
        required: usize,
    },
}

/// A model that can be estimated from minimal samples.
pub trait Estimator {
    /// One observation.
    type Datum;
    /// The estimated model.
    type Model: Clone;

    /// Minimal number of data needed to fit a model.
    const SAMPLE_SIZE: usize;

    /// Fit a model from the data at `sample`, `None` if fitting fails.
    fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Squared error of one datum under a model.
    fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Whether a sample is degenerate and must be skipped before fitting.
    fn is_degenerate(&self, _data: &[Self::Datum], _sample: &[usize]) -> bool {
        false
    }

    /// Refit a model on all inliers. Default: no refit.
    fn refit(&self, _data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

// dynamic iteration bound from the current inlier ratio
fn calculate_iterations(
    confidence: f64,
    inlier_ratio: f64,
    sample_size: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    if inlier_ratio >= 1.0 {
        return iters_so_far.min(max_iters);
    }

    let denom = (1.0 - inlier_ratio.powi(sample_size as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }

    let n_iter = ((1.0 - confidence).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

struct Score {
    inliers: Vec<bool>,
    count: usize,
    sum_sq: f64,
}

fn score<E: Estimator>(estimator: &E, model: &E::Model, data: &[E::Datum], thresh_sq: f64) -> Score {
    let mut inliers = vec![false; data.len()];
    let mut count = 0usize;
    let mut sum_sq = 0.0;
    for (flag, datum) in inliers.iter_mut().zip(data.iter()) {
        let r = estimator.residual(model, datum);
        if r <= thresh_sq {
            *flag = true;
            count += 1;
            sum_sq += r;
        }
    }
    Score {
        inliers,
        count,
        sum_sq,
    }
}

fn is_better(new: &Score, best: &Score) -> bool {
    new.count > best.count || (new.count == best.count && new.sum_sq < best.sum_sq)
}

/// Run a RANSAC loop for a given [`Estimator`].
///
/// The number of iterations adapts to the best inlier ratio seen so far.
/// Whenever a sample produces a new best model it is refitted on its inliers
/// and the refit is kept if it scores at least as well.
///
/// # Errors
///
/// Returns [`RansacError::NotEnoughData`] if `data` is smaller than the
/// minimal sample, [`RansacError::DegenerateSamples`] if no sample could be
/// fitted and [`RansacError::NoConsensus`] if the best model has fewer than
/// `max(params.min_inliers, E::SAMPLE_SIZE)` inliers.
pub fn ransac<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    params: &RansacParams,
) -> Result<RansacResult<E::Model>, RansacError> {
    let n = data.len();
    if n < E::SAMPLE_SIZE || E::SAMPLE_SIZE == 0 {
        return Err(RansacError::NotEnoughData {
            required: E::SAMPLE_SIZE,
            actual: n,
        });
    }

    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => {
            let mut tr = rand::rng();
            StdRng::from_rng(&mut tr)
        }
    };

    let thresh_sq = params.threshold * params.threshold;
    let required = params.min_inliers.max(E::SAMPLE_SIZE);

    // a single distinct sample exists when the data is exactly the minimal set
    let mut dynamic_max_iters = if n == E::SAMPLE_SIZE {
        1
    } else {
        params.max_iterations.max(1)
    };

    let mut best: Option<(E::Model, Score)> = None;
    let mut sample = Vec::with_capacity(E::SAMPLE_SIZE);
    let mut iterations = 0usize;

    while iterations < dynamic_max_iters {
        iterations += 1;

        sample.clear();
        sample.extend(rand::seq::index::sample(&mut rng, n, E::SAMPLE_SIZE).iter());
        sample.sort_unstable();

        if estimator.is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = estimator.fit(data, &sample) else {
            continue;
        };

        let candidate = score(estimator, &model, data, thresh_sq);
        if best.as_ref().is_some_and(|(_, b)| !is_better(&candidate, b)) {
            continue;
        }

        // local refinement on the new consensus set
        let inlier_idx: Vec<usize> = (0..n).filter(|&i| candidate.inliers[i]).collect();
        let (model, candidate) = match estimator.refit(data, &inlier_idx) {
            Some(refined) => {
                let refined_score = score(estimator, &refined, data, thresh_sq);
                if refined_score.count >= candidate.count {
                    (refined, refined_score)
                } else {
                    (model, candidate)
                }
            }
            None => (model, candidate),
        };

        let inlier_ratio = candidate.count as f64 / n as f64;
        dynamic_max_iters = calculate_iterations(
            params.confidence,
            inlier_ratio,
            E::SAMPLE_SIZE,
            iterations,
            dynamic_max_iters,
        );
        best = Some((model, candidate));
    }

    let Some((model, best)) = best else {
        return Err(RansacError::DegenerateSamples);
    };

    log::trace!(
        "ransac: {} inliers of {n} after {iterations} iterations",
        best.count
    );

    if best.count < required {
        return Err(RansacError::NoConsensus {
            best: best.count,
            required,
        });
    }

    Ok(RansacResult {
        model,
        rms: (best.sum_sq / best.count as f64).sqrt(),
        inliers: best.inliers,
        inlier_count: best.count,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct LineModel {
        slope: f64,
        intercept: f64,
    }

    struct LineEstimator;

    impl Estimator for LineEstimator {
        type Datum = (f64, f64);
        type Model = LineModel;

        const SAMPLE_SIZE: usize = 2;

        fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
            let (p0, p1) = (data[sample[0]], data[sample[1]]);
            let dx = p1.0 - p0.0;
            if dx.abs() < 1e-9 {
                return None;
            }
            let slope = (p1.1 - p0.1) / dx;
            Some(LineModel {
                slope,
                intercept: p0.1 - slope * p0.0,
            })
        }

        fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> f64 {
            let (x, y) = *datum;
            let numer = model.slope * x - y + model.intercept;
            numer * numer / (model.slope * model.slope + 1.0)
        }

        fn refit(&self, data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
            if inliers.len() < 2 {
                return None;
            }
            let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
            for &idx in inliers {
                let (x, y) = data[idx];
                sx += x;
                sy += y;
                sxx += x * x;
                sxy += x * y;
            }
            let n = inliers.len() as f64;
            let denom = n * sxx - sx * sx;
            if denom.abs() < 1e-12 {
                return None;
            }
            let slope = (n * sxy - sx * sy) / denom;
            Some(LineModel {
                slope,
                intercept: (sy - slope * sx) / n,
            })
        }
    }

    fn line_with_outliers() -> Vec<(f64, f64)> {
        let mut data: Vec<(f64, f64)> = (0..10)
            .map(|i| {
                let x = i as f64 * 0.5;
                (x, 2.0 * x + 1.0 + if i % 2 == 0 { 0.01 } else { -0.01 })
            })
            .collect();
        data.extend([(5.0, -3.0), (6.0, 10.0), (7.0, -8.0)]);
        data
    }

    #[test]
    fn ransac_recovers_line_with_outliers() -> Result<(), RansacError> {
        let params = RansacParams {
            threshold: 0.05,
            min_inliers: 6,
            ..Default::default()
        };
        let res = ransac(&LineEstimator, &line_with_outliers(), &params)?;
        assert_relative_eq!(res.model.slope, 2.0, epsilon = 0.05);
        assert_relative_eq!(res.model.intercept, 1.0, epsilon = 0.05);
        assert_eq!(res.inlier_count, 10);
        assert_eq!(res.inliers.len(), 13);
        assert!(!res.inliers[10] && !res.inliers[11] && !res.inliers[12]);
        assert!(res.rms < 0.05);
        Ok(())
    }

    #[test]
    fn ransac_is_deterministic() -> Result<(), RansacError> {
        let params = RansacParams {
            threshold: 0.05,
            ..Default::default()
        };
        let data = line_with_outliers();
        let a = ransac(&LineEstimator, &data, &params)?;
        let b = ransac(&LineEstimator, &data, &params)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn ransac_errors() {
        let params = RansacParams::default();
        assert_eq!(
            ransac(&LineEstimator, &[(0.0, 0.0)], &params),
            Err(RansacError::NotEnoughData {
                required: 2,
                actual: 1
            })
        );
        // vertical data can never be fitted by the slope model
        assert_eq!(
            ransac(&LineEstimator, &[(1.0, 0.0), (1.0, 1.0), (1.0, 2.0)], &params),
            Err(RansacError::DegenerateSamples)
        );
        let strict = RansacParams {
            threshold: 0.05,
            min_inliers: 12,
            ..Default::default()
        };
        assert_eq!(
            ransac(&LineEstimator, &line_with_outliers(), &strict),
            Err(RansacError::NoConsensus {
                best: 10,
                required: 12
            })
        );
    }

    #[test]
    fn iterations_adapt_to_inlier_ratio() {
        assert_eq!(calculate_iterations(0.99, 0.0, 4, 1, 100), 100);
        assert_eq!(calculate_iterations(0.99, 1.0, 4, 3, 100), 3);
        // 50% inliers, 4-point samples: log(0.01) / log(1 - 1/16) = 71.4
        assert_eq!(calculate_iterations(0.99, 0.5, 4, 1, 1000), 72);
        assert_eq!(calculate_iterations(0.99, 0.5, 4, 1, 50), 50);
    }
}
