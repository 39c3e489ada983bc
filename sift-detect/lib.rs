//! Scale-space pyramids, corner responses and keypoint detection.
//!
//! Two detection paths share one configuration:
//! - single-scale corners: Moravec or Harris response, local maxima, optional ANMS
//! - multi-scale keypoints: extrema of a difference-of-Gaussians pyramid

pub mod builder;
pub mod config;
pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod extrema;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use builder::DetectorBuilder;
pub use config::{AnmsSpec, CornerSpec, DetectorConfig, ExtremaSpec};
pub use corner_detection::CornerDetector;
pub use detector::{FeatureDetector, ScaleSpaceDetection};
pub use error::{DetectError, DetectResult};
pub use extrema::ExtremaFinder;
pub use pyramid::ScaleSpacePyramid;
pub use refinement::KeypointRefinement;
pub use types::{CornerMethod, HarrisFormula, LevelNaming, PyramidLevel, PyramidSpec};
