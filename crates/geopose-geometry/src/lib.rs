#![deny(missing_docs)]
//! # Two-view geometry
//!
//! Recovering a geometric transform between a query and a reference image
//! from 2D point correspondences of unknown quality.
//!
//! - [`correspondence`]: keypoints, correspondences and correspondence sets
//! - [`homography`]: homography (planar scenes or pure rotation, 8 DOF)
//! - [`essential`]: essential matrix (epipolar geometry in metric space, 5 DOF)
//! - [`ransac`]: model-agnostic random sample consensus
//! - [`solver`]: robust transform fitting with degeneracy detection

/// Keypoints and correspondences.
pub mod correspondence;

/// Essential matrix estimation and decomposition.
pub mod essential;

/// Homography estimation.
pub mod homography;

/// Linear algebra utilities.
pub mod linalg;

/// Random sample consensus.
pub mod ransac;

/// Robust transform solver.
pub mod solver;

/// Linear triangulation and cheirality checks.
pub mod triangulation;

pub use correspondence::{Correspondence, CorrespondenceError, CorrespondenceSet, Keypoint};
pub use essential::{CandidateKind, PoseCandidate};
pub use linalg::Mat33;
pub use ransac::{Estimator, RansacError, RansacParams, RansacResult};
pub use solver::{
    CameraIntrinsics, FitFailure, FittedTransform, ModelKind, RansacTransformSolver,
    RelativePose, Transform, TransformSolver,
};
