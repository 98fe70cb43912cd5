//! Error types for model construction and forward/loss computation.

use thiserror::Error;

/// Model-specific errors.
///
/// Everything except `IoError` is structural: a configuration the model cannot
/// be built from, or a tensor that does not fit the frozen configuration.
/// None of them are retried.
#[derive(Debug, Error)]
pub enum MdlError {
    /// Configuration is invalid or could not be parsed.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Bridge mode string is not one of `concat` / `sum`.
    #[error("Invalid bridge mode '{0}': expected 'concat' or 'sum'")]
    InvalidBridge(String),

    /// Input tensor does not match the configured layer dimensions.
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// External gating is enabled but no covariates were supplied.
    #[error("External covariates required: model was built with external_dim = {external_dim}")]
    MissingExternal { external_dim: usize },

    /// Tensor engine failure.
    #[error("Tensor operation failed: {message}")]
    TensorError { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for model operations.
pub type MdlResult<T> = Result<T, MdlError>;

impl MdlError {
    /// Build a shape mismatch error from tensor dims.
    pub fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
