use thiserror::Error;

/// Errors raised by grid construction and the numeric primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Buffer length mismatch: expected {expected_len} values for the grid, got {actual_len}")]
    DimensionMismatch { expected_len: usize, actual_len: usize },

    #[error("Grid shapes differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    ShapeMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize,
    },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl CoreError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
