//! Prediction error metrics for node and edge flow.

use candle_core::Tensor;

use crate::error::{MdlError, MdlResult};

/// RMSE and MAE on both prediction targets, in physical units.
#[derive(Debug, Clone, Default)]
pub struct FlowMetrics {
    pub node_rmse: f32,
    pub node_mae: f32,
    pub edge_rmse: f32,
    pub edge_mae: f32,
}

impl FlowMetrics {
    /// Compute all four metrics.
    pub fn compute(
        node_pred: &Tensor,
        node_gt: &Tensor,
        edge_pred: &Tensor,
        edge_gt: &Tensor,
    ) -> MdlResult<Self> {
        Ok(Self {
            node_rmse: rmse(node_pred, node_gt)?,
            node_mae: mae(node_pred, node_gt)?,
            edge_rmse: rmse(edge_pred, edge_gt)?,
            edge_mae: mae(edge_pred, edge_gt)?,
        })
    }

    /// Format metrics as a summary string.
    pub fn summary(&self) -> String {
        format!(
            "node RMSE={:.4} MAE={:.4} | edge RMSE={:.4} MAE={:.4}",
            self.node_rmse, self.node_mae, self.edge_rmse, self.edge_mae
        )
    }
}

/// Root mean squared error.
pub fn rmse(pred: &Tensor, gt: &Tensor) -> MdlResult<f32> {
    check_same_shape(pred, gt)?;
    let mse: f32 = pred
        .sub(gt)
        .and_then(|d| d.sqr())
        .and_then(|d| d.mean_all())
        .and_then(|m| m.to_scalar())
        .map_err(map_candle)?;
    Ok(mse.sqrt())
}

/// Mean absolute error.
pub fn mae(pred: &Tensor, gt: &Tensor) -> MdlResult<f32> {
    check_same_shape(pred, gt)?;
    pred.sub(gt)
        .and_then(|d| d.abs())
        .and_then(|d| d.mean_all())
        .and_then(|m| m.to_scalar())
        .map_err(map_candle)
}

fn check_same_shape(pred: &Tensor, gt: &Tensor) -> MdlResult<()> {
    if pred.dims() != gt.dims() {
        return Err(MdlError::shape("metric inputs", gt.dims(), pred.dims()));
    }
    Ok(())
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Metric computation error: {}", e),
    }
}
