//! External-factor gating of predicted flow.
//!
//! ```text
//! X_ext (N, F)
//!     → fc1 (F → 10) → ReLU
//!     → fc2 (10 → 2·H·W)        node head
//!       fc3 (10 → 2·(H·W)²)     edge head
//!     → ReLU → reshape (N, planes, H, W) → sigmoid = gate
//! out = tanh(gate ⊙ flow)
//! ```
//!
//! External factors (weather, time of day, holidays) scale the predicted
//! magnitude rather than entering the network as raw features.
//!
//! # Disabled state
//!
//! A model configured without `external_dim` (or with `0`) has no gating
//! parameters. Every gating call then returns the flow unchanged and emits a
//! `warn!` event, so the missing covariates stay visible in logs without
//! halting training.

use candle_core::Tensor;
use candle_nn::{Linear, Module, VarBuilder};
use tracing::warn;

use crate::error::{MdlError, MdlResult};
use crate::{EXTERNAL_HIDDEN, NODE_FLOW_PLANES};

/// Which prediction head a gate is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTarget {
    Node,
    Edge,
}

/// Observable gating configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatingState {
    /// Covariates of width `external_dim` gate both heads.
    Enabled { external_dim: usize },
    /// No gating parameters; `configured` is the raw `external_dim` setting.
    Disabled { configured: Option<usize> },
}

/// External gating sub-network shared by the node and edge heads.
#[derive(Debug, Clone)]
pub enum ExternalGate {
    Enabled {
        external_dim: usize,
        grid: (usize, usize),
        fc1: Linear,
        node_fc: Linear,
        edge_fc: Linear,
    },
    Disabled {
        configured: Option<usize>,
    },
}

impl ExternalGate {
    /// Build the gate; `external_dim` of `None` or `Some(0)` yields
    /// [`ExternalGate::Disabled`].
    pub fn new(
        external_dim: Option<usize>,
        grid: (usize, usize),
        vb: VarBuilder,
    ) -> MdlResult<Self> {
        let dim = match external_dim {
            Some(d) if d > 0 => d,
            configured => {
                warn!(
                    external_dim = ?configured,
                    "external_dim unset; external gating disabled, flow passes through unmodified"
                );
                return Ok(Self::Disabled { configured });
            }
        };

        let cells = grid.0 * grid.1;
        let fc1 = candle_nn::linear(dim, EXTERNAL_HIDDEN, vb.pp("fc1")).map_err(map_candle)?;
        let node_fc = candle_nn::linear(EXTERNAL_HIDDEN, NODE_FLOW_PLANES * cells, vb.pp("fc2"))
            .map_err(map_candle)?;
        let edge_fc = candle_nn::linear(EXTERNAL_HIDDEN, 2 * cells * cells, vb.pp("fc3"))
            .map_err(map_candle)?;

        Ok(Self::Enabled {
            external_dim: dim,
            grid,
            fc1,
            node_fc,
            edge_fc,
        })
    }

    pub fn state(&self) -> GatingState {
        match self {
            Self::Enabled { external_dim, .. } => GatingState::Enabled {
                external_dim: *external_dim,
            },
            Self::Disabled { configured } => GatingState::Disabled {
                configured: *configured,
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    /// Gate `flow` (`(N, planes, H, W)`) with `x_ext` (`(N, F)`).
    ///
    /// # Errors
    /// - `MdlError::MissingExternal` if enabled and `x_ext` is `None`
    /// - `MdlError::ShapeMismatch` if `x_ext` or `flow` do not fit the configuration
    pub fn apply(
        &self,
        x_ext: Option<&Tensor>,
        flow: &Tensor,
        target: GateTarget,
    ) -> MdlResult<Tensor> {
        let (external_dim, grid, fc1, node_fc, edge_fc) = match self {
            Self::Enabled {
                external_dim,
                grid,
                fc1,
                node_fc,
                edge_fc,
            } => (*external_dim, *grid, fc1, node_fc, edge_fc),
            Self::Disabled { configured } => {
                warn!(
                    external_dim = ?configured,
                    target = ?target,
                    "external gating skipped: external_dim unset"
                );
                return Ok(flow.clone());
            }
        };

        let x_ext = x_ext.ok_or(MdlError::MissingExternal { external_dim })?;

        let (n, planes, h, w) = flow.dims4().map_err(map_candle)?;
        let expected_planes = match target {
            GateTarget::Node => NODE_FLOW_PLANES,
            GateTarget::Edge => 2 * grid.0 * grid.1,
        };
        if (planes, h, w) != (expected_planes, grid.0, grid.1) {
            return Err(MdlError::shape(
                "gated flow",
                &[n, expected_planes, grid.0, grid.1],
                flow.dims(),
            ));
        }
        if x_ext.dims() != [n, external_dim] {
            return Err(MdlError::shape(
                "external covariates",
                &[n, external_dim],
                x_ext.dims(),
            ));
        }

        let hidden = fc1.forward(x_ext).map_err(map_candle)?;
        let hidden = hidden.relu().map_err(map_candle)?;
        let projection = match target {
            GateTarget::Node => node_fc,
            GateTarget::Edge => edge_fc,
        };
        let external = projection
            .forward(&hidden)
            .map_err(map_candle)?
            .relu()
            .map_err(map_candle)?
            .reshape((n, planes, h, w))
            .map_err(map_candle)?;

        let gate = candle_nn::ops::sigmoid(&external).map_err(map_candle)?;
        gate.mul(flow)
            .map_err(map_candle)?
            .tanh()
            .map_err(map_candle)
    }
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("External gating error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn to_vec(t: &Tensor) -> Vec<f32> {
        t.flatten_all().unwrap().to_vec1().unwrap()
    }

    #[test]
    fn test_disabled_passes_flow_through() {
        for configured in [None, Some(0)] {
            let varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
            let gate = ExternalGate::new(configured, (2, 2), vb).unwrap();
            assert!(!gate.is_enabled());
            assert_eq!(gate.state(), GatingState::Disabled { configured });
            assert!(varmap.all_vars().is_empty());

            let flow = Tensor::new(&[3.0f32, -2.0, 0.5, 9.0], &Device::Cpu)
                .unwrap()
                .reshape((1, 1, 2, 2))
                .unwrap();
            let out = gate.apply(None, &flow, GateTarget::Node).unwrap();
            assert_eq!(to_vec(&out), to_vec(&flow));
        }
    }

    #[test]
    fn test_enabled_output_bounded() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let gate = ExternalGate::new(Some(4), (3, 3), vb).unwrap();
        assert_eq!(gate.state(), GatingState::Enabled { external_dim: 4 });

        let x_ext = Tensor::randn(0f32, 1f32, (2, 4), &Device::Cpu).unwrap();
        let node_flow = Tensor::randn(0f32, 10f32, (2, 2, 3, 3), &Device::Cpu).unwrap();
        let edge_flow = Tensor::randn(0f32, 10f32, (2, 18, 3, 3), &Device::Cpu).unwrap();

        let node = gate.apply(Some(&x_ext), &node_flow, GateTarget::Node).unwrap();
        let edge = gate.apply(Some(&x_ext), &edge_flow, GateTarget::Edge).unwrap();
        assert_eq!(node.dims(), &[2, 2, 3, 3]);
        assert_eq!(edge.dims(), &[2, 18, 3, 3]);
        assert!(to_vec(&edge).iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_zero_projection_halves_flow_before_tanh() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let gate = ExternalGate::new(Some(2), (1, 1), vb).unwrap();
        for var in varmap.all_vars() {
            var.set(&var.zeros_like().unwrap()).unwrap();
        }

        // sigmoid(0) = 0.5 → out = tanh(0.5 * flow)
        let x_ext = Tensor::ones((1, 2), DType::F32, &Device::Cpu).unwrap();
        let flow = Tensor::new(&[2.0f32, -4.0], &Device::Cpu)
            .unwrap()
            .reshape((1, 2, 1, 1))
            .unwrap();
        let out = to_vec(&gate.apply(Some(&x_ext), &flow, GateTarget::Node).unwrap());
        assert!((out[0] - 1.0f32.tanh()).abs() < 1e-6);
        assert!((out[1] - (-2.0f32).tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_missing_covariates_rejected() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let gate = ExternalGate::new(Some(3), (2, 2), vb).unwrap();
        let flow = Tensor::zeros((1, 2, 2, 2), DType::F32, &Device::Cpu).unwrap();

        assert!(matches!(
            gate.apply(None, &flow, GateTarget::Node),
            Err(MdlError::MissingExternal { external_dim: 3 })
        ));

        let wrong = Tensor::zeros((1, 5), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            gate.apply(Some(&wrong), &flow, GateTarget::Node),
            Err(MdlError::ShapeMismatch { .. })
        ));
    }
}
