use sift_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid pyramid: {0}")]
    InvalidPyramid(String),

    #[error("Invalid window size `{name}`: {size} (must be > 0)")]
    InvalidWindow { name: &'static str, size: usize },

    #[error("Invalid threshold: {0} (must be finite)")]
    InvalidThreshold(f64),

    #[error("Image {width}x{height} too small (minimum {min_size}x{min_size})")]
    ImageTooSmall {
        width: usize,
        height: usize,
        min_size: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DetectResult<T> = Result<T, DetectError>;
