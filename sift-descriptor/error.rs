use sift_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid descriptor layout: {0}")]
    InvalidLayout(String),

    #[error("Descriptor lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;
