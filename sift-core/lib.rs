//! Core types for scale-space feature detection: a border-aware dense grid,
//! convolution kernels and the shared keypoint type.

pub mod border;
pub mod error;
pub mod grid;
pub mod kernels;
pub mod keypoint;

pub use border::BorderPolicy;
pub use error::{CoreError, CoreResult};
pub use grid::Grid;
pub use keypoint::KeyPoint;
