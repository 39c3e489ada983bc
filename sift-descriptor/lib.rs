//! Gradient-histogram descriptors for scale-space keypoints.
//!
//! Keypoints get one or two dominant orientations from a 36-bin gradient
//! histogram, then a grid of per-cell orientation histograms sampled in the
//! keypoint's frame. Descriptors are compared by L1, L2 or SSD distance and
//! matched with the nearest-neighbour distance ratio test.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod matching;
pub mod orientation;

pub use config::{Capabilities, ExtractorConfig};
pub use descriptor::{Descriptor, DistanceMetric, GridLayout, TRUNCATION_LIMIT};
pub use error::{DescriptorError, DescriptorResult};
pub use extractor::DescriptorExtractor;
pub use matching::{find_matches, try_find_matches, DEFAULT_NNDR_THRESHOLD};
pub use orientation::{bin_indexes, bin_weights, BinWeights, OrientationEstimator, DEFAULT_ORIENTATION_BINS};
