//! Bridge between the two views and the two prediction heads.

use candle_core::Tensor;
use candle_nn::{Conv2d, Module, VarBuilder};

use crate::config::Bridge;
use crate::error::{MdlError, MdlResult};
use crate::layers::conv3x3_config;
use crate::{FUSED_CHANNELS, NODE_FLOW_PLANES};

/// Joins node and edge fusion outputs according to the bridge mode.
#[derive(Debug, Clone)]
pub enum BridgeLayer {
    /// `cat([node, edge], dim=1)` → 128 channels.
    Concat,
    /// `node + reduction(edge)` → 64 channels.
    Sum { reduction: Conv2d },
}

impl BridgeLayer {
    pub fn new(bridge: Bridge, vb: VarBuilder) -> MdlResult<Self> {
        match bridge {
            Bridge::Concat => Ok(Self::Concat),
            Bridge::Sum => {
                let reduction = candle_nn::conv2d(
                    FUSED_CHANNELS,
                    FUSED_CHANNELS,
                    1,
                    Default::default(),
                    vb.pp("reduction_dim_conv"),
                )
                .map_err(map_candle)?;
                Ok(Self::Sum { reduction })
            }
        }
    }

    pub fn bridge(&self) -> Bridge {
        match self {
            Self::Concat => Bridge::Concat,
            Self::Sum { .. } => Bridge::Sum,
        }
    }

    /// Combine `(N, 64, H, W)` node and edge features.
    pub fn forward(&self, node_flow: &Tensor, edge_flow: &Tensor) -> MdlResult<Tensor> {
        if node_flow.dims() != edge_flow.dims() {
            return Err(MdlError::shape(
                "bridge inputs",
                node_flow.dims(),
                edge_flow.dims(),
            ));
        }

        match self {
            Self::Concat => Tensor::cat(&[node_flow, edge_flow], 1).map_err(map_candle),
            Self::Sum { reduction } => {
                let reduced = reduction.forward(edge_flow).map_err(map_candle)?;
                node_flow.add(&reduced).map_err(map_candle)
            }
        }
    }
}

/// Node head (→ 2 planes) and edge head (→ `2*H*W` transition channels).
#[derive(Debug, Clone)]
pub struct PredictionHeads {
    node_conv: Conv2d,
    edge_conv: Conv2d,
    in_channels: usize,
}

impl PredictionHeads {
    /// Build heads reading `in_channels` fused channels on an `h x w` grid.
    ///
    /// # Errors
    /// `MdlError::ConfigError` if `in_channels` is not the width `bridge`
    /// produces (128 for concat, 64 for sum).
    pub fn new(
        in_channels: usize,
        bridge: Bridge,
        grid: (usize, usize),
        vb: VarBuilder,
    ) -> MdlResult<Self> {
        let expected = bridge.head_in_channels();
        if in_channels != expected {
            return Err(MdlError::config(format!(
                "bridge '{}' feeds {} channels to the prediction heads, got {}",
                bridge, expected, in_channels
            )));
        }

        let edge_planes = 2 * grid.0 * grid.1;
        let cfg = conv3x3_config();
        let node_conv = candle_nn::conv2d(in_channels, NODE_FLOW_PLANES, 3, cfg, vb.pp("node_conv"))
            .map_err(map_candle)?;
        let edge_conv = candle_nn::conv2d(in_channels, edge_planes, 3, cfg, vb.pp("edge_conv"))
            .map_err(map_candle)?;

        Ok(Self {
            node_conv,
            edge_conv,
            in_channels,
        })
    }

    /// Raw (ungated) node and edge flow maps.
    pub fn forward(&self, fused: &Tensor) -> MdlResult<(Tensor, Tensor)> {
        let (n, c, h, w) = fused.dims4().map_err(map_candle)?;
        if c != self.in_channels {
            return Err(MdlError::shape(
                "prediction head input",
                &[n, self.in_channels, h, w],
                fused.dims(),
            ));
        }
        let node = self.node_conv.forward(fused).map_err(map_candle)?;
        let edge = self.edge_conv.forward(fused).map_err(map_candle)?;
        Ok((node, edge))
    }
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Prediction head error: {}", e),
    }
}
