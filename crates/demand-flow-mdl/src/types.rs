//! Input and output bundles passed across the model boundary.

use candle_core::Tensor;

/// One view's three temporal granularities, each `(N, T_i, C, H, W)`.
#[derive(Debug, Clone)]
pub struct ViewInput {
    /// Recent time steps.
    pub closeness: Tensor,
    /// Same time of day on previous days.
    pub period: Tensor,
    /// Same time of week in previous weeks.
    pub trend: Tensor,
}

impl ViewInput {
    pub fn new(closeness: Tensor, period: Tensor, trend: Tensor) -> Self {
        Self {
            closeness,
            period,
            trend,
        }
    }
}

/// A training/evaluation batch for the multi-task loss.
#[derive(Debug, Clone)]
pub struct MdlBatch {
    /// Node view history.
    pub node: ViewInput,
    /// Edge (transition) view history.
    pub edge: ViewInput,
    /// External covariates `(N, F)`, absent when the model runs without gating.
    pub external: Option<Tensor>,
    /// Node ground truth `(N, 2, H, W)`, physical units.
    pub node_target: Tensor,
    /// Edge ground truth `(N, 2*H*W, H, W)`, physical units.
    pub edge_target: Tensor,
}

/// Model output.
#[derive(Debug, Clone)]
pub struct MdlPrediction {
    /// `(N, 2, H, W)`: outflow plane, inflow plane.
    pub node: Tensor,
    /// `(N, 2*H*W, H, W)`: outgoing then incoming transitions per cell.
    pub edge: Tensor,
}
