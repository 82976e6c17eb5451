#![deny(missing_docs)]
//! # Feature detection, description and matching
//!
//! Building blocks of the classical matching backend:
//!
//! - [`fast`]: FAST corner detection with a SAD score and non-maximum suppression
//! - [`brief`]: 256-bit BRIEF binary descriptors on a smoothed image
//! - [`matching`]: brute-force Hamming matching with cross-check and ratio test

/// FAST corner detector.
pub mod fast;

/// BRIEF binary descriptors.
pub mod brief;

/// Binary descriptor matching.
pub mod matching;

pub use brief::{BriefExtractor, Descriptor, DESCRIPTOR_BITS};
pub use fast::{fast_feature_detector, non_max_suppression, FastCorner};
pub use matching::{hamming_distance, match_descriptors, DescriptorMatch};
