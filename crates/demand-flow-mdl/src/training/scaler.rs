//! Normalization between physical flow counts and model range.

use candle_core::{DType, Tensor};

use crate::error::{MdlError, MdlResult};

/// Shape-preserving, invertible value mapping.
///
/// `inverse_transform(transform(x)) ≈ x` must hold for the multi-task loss
/// to compare predictions with ground truth in physical units.
pub trait Scaler {
    /// Physical units → model range.
    fn transform(&self, x: &Tensor) -> MdlResult<Tensor>;

    /// Model range → physical units.
    fn inverse_transform(&self, x: &Tensor) -> MdlResult<Tensor>;
}

/// Leaves values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, x: &Tensor) -> MdlResult<Tensor> {
        Ok(x.clone())
    }

    fn inverse_transform(&self, x: &Tensor) -> MdlResult<Tensor> {
        Ok(x.clone())
    }
}

/// Min-max scaling of `[min, max]` onto `[-1, 1]`, the output range of the
/// model's tanh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// # Errors
    /// `MdlError::ConfigError` unless `max > min` and both are finite.
    pub fn new(min: f64, max: f64) -> MdlResult<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(MdlError::config(format!(
                "MinMaxScaler needs finite min < max, got [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Fit to the global minimum and maximum of `data`.
    pub fn fit(data: &Tensor) -> MdlResult<Self> {
        let flat = data
            .to_dtype(DType::F64)
            .and_then(|t| t.flatten_all())
            .map_err(map_candle)?;
        let min = flat
            .min(0)
            .and_then(|t| t.to_scalar::<f64>())
            .map_err(map_candle)?;
        let max = flat
            .max(0)
            .and_then(|t| t.to_scalar::<f64>())
            .map_err(map_candle)?;
        Self::new(min, max)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }
}

impl Scaler for MinMaxScaler {
    fn transform(&self, x: &Tensor) -> MdlResult<Tensor> {
        // 2 * (x - min) / range - 1
        let scale = 2.0 / self.range();
        x.affine(scale, -self.min * scale - 1.0).map_err(map_candle)
    }

    fn inverse_transform(&self, x: &Tensor) -> MdlResult<Tensor> {
        // (x + 1) / 2 * range + min
        let half = self.range() / 2.0;
        x.affine(half, half + self.min).map_err(map_candle)
    }
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Scaler error: {}", e),
    }
}
