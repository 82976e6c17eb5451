#![deny(missing_docs)]
//! # Matching backends
//!
//! A [`MatchingBackend`] turns a pair of grayscale images into candidate
//! correspondences with per-match confidences. Backends are chosen and
//! provisioned once, at construction, and are interchangeable afterwards.

/// The matching backend trait.
pub mod backend;

/// FAST + BRIEF matcher running on the CPU.
pub mod classical;

/// Adapter for learned dense matchers.
pub mod dense;

/// Compute device selection.
pub mod device;

/// Error types of the matching backends.
pub mod error;

pub use backend::MatchingBackend;
pub use classical::{ClassicalMatcher, ClassicalMatcherConfig};
pub use dense::{DenseMatcher, DenseMatcherConfig, DenseMatcherModel, DenseMatches, DenseModelLoader};
pub use device::{select_device, AcceleratorProbe, CpuOnly, Device, ExecutionMode};
pub use error::{ConstructionError, ImageRole, InputContractError};
