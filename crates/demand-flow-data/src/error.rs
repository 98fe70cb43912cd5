//! Error types for dataset construction and sample access.

use demand_flow_mdl::MdlError;
use thiserror::Error;

/// Data pipeline errors.
#[derive(Debug, Error)]
pub enum DataError {
    /// Sample index past the end of the dataset.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Raw series does not have the layout the adapter expects.
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Target step has too little history for the sampler.
    #[error("Target step {target} lacks history: first valid step is {first_valid}")]
    InsufficientHistory { target: usize, first_valid: usize },

    /// Invalid sampler / loader parameters.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Tensor engine failure.
    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Error raised by the model crate.
    #[error(transparent)]
    Model(#[from] MdlError),
}

/// Result type for data operations.
pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    pub(crate) fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
