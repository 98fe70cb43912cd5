//! Pre-activation residual unit.
//!
//! ```text
//! x ─┬─ BN → ReLU → Conv3x3 → BN → ReLU → Conv3x3 ─┬─ (+) → out
//!    └──────────────────────────────────────────────┘
//! ```
//!
//! The skip connection carries the raw input, not the normalized one.

use candle_core::Tensor;
use candle_nn::{BatchNorm, Conv2d, Module, ModuleT, VarBuilder};

use crate::error::{MdlError, MdlResult};

use super::{conv3x3_config, BN_EPS};

/// A single two-convolution residual block with constant width.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    bn1: BatchNorm,
    conv1: Conv2d,
    bn2: BatchNorm,
    conv2: Conv2d,
    planes: usize,
}

impl ResidualBlock {
    /// Create a block operating on `planes` channels.
    pub fn new(planes: usize, vb: VarBuilder) -> MdlResult<Self> {
        let cfg = conv3x3_config();
        let conv1 = candle_nn::conv2d_no_bias(planes, planes, 3, cfg, vb.pp("conv1"))
            .map_err(map_candle)?;
        let bn1 = candle_nn::batch_norm(planes, BN_EPS, vb.pp("bn1")).map_err(map_candle)?;
        let conv2 = candle_nn::conv2d_no_bias(planes, planes, 3, cfg, vb.pp("conv2"))
            .map_err(map_candle)?;
        let bn2 = candle_nn::batch_norm(planes, BN_EPS, vb.pp("bn2")).map_err(map_candle)?;

        Ok(Self {
            bn1,
            conv1,
            bn2,
            conv2,
            planes,
        })
    }

    /// Channel width.
    #[inline]
    #[must_use]
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// Forward pass; `train` selects batch statistics over running statistics.
    ///
    /// # Errors
    /// `MdlError::ShapeMismatch` if `x` is not `(N, planes, H, W)`.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> MdlResult<Tensor> {
        let (n, c, h, w) = x.dims4().map_err(map_candle)?;
        if c != self.planes {
            return Err(MdlError::shape(
                "residual block input",
                &[n, self.planes, h, w],
                x.dims(),
            ));
        }

        let out = self.bn1.forward_t(x, train).map_err(map_candle)?;
        let out = out.relu().map_err(map_candle)?;
        let out = self.conv1.forward(&out).map_err(map_candle)?;
        let out = self.bn2.forward_t(&out, train).map_err(map_candle)?;
        let out = out.relu().map_err(map_candle)?;
        let out = self.conv2.forward(&out).map_err(map_candle)?;

        out.add(x).map_err(map_candle)
    }
}

/// `nb_residual_unit` residual blocks applied in sequence.
#[derive(Debug, Clone)]
pub struct ResidualStack {
    blocks: Vec<ResidualBlock>,
}

impl ResidualStack {
    /// Blocks are registered as `0`, `1`, ... under `vb`.
    pub fn new(planes: usize, repetitions: usize, vb: VarBuilder) -> MdlResult<Self> {
        let blocks = (0..repetitions)
            .map(|i| ResidualBlock::new(planes, vb.pp(i.to_string())))
            .collect::<MdlResult<Vec<_>>>()?;
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn forward_t(&self, x: &Tensor, train: bool) -> MdlResult<Tensor> {
        let mut out = x.clone();
        for block in &self.blocks {
            out = block.forward_t(&out, train)?;
        }
        Ok(out)
    }
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Residual block error: {}", e),
    }
}
