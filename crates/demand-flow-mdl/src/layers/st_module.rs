//! Spatio-temporal feature module.
//!
//! ```text
//! (N, C_in, H, W)
//!     → Conv3x3(C_in → hidden) → ReLU
//!     → layer1 → layer2 → layer3        (independent residual stacks)
//!     → Conv3x3(hidden → 64)
//! (N, 64, H, W)
//! ```
//!
//! `hidden` is 64 for the node view and 128 for the edge view; the output
//! width is always [`FUSED_CHANNELS`] so node and edge features combine.

use candle_core::Tensor;
use candle_nn::{Conv2d, Module, VarBuilder};
use tracing::trace;

use crate::config::ViewKind;
use crate::error::{MdlError, MdlResult};
use crate::FUSED_CHANNELS;

use super::{conv3x3_config, ResidualStack};

/// Projection, three residual stacks, and a projection back to 64 channels.
#[derive(Debug, Clone)]
pub struct StModule {
    conv1: Conv2d,
    layer1: ResidualStack,
    layer2: ResidualStack,
    layer3: ResidualStack,
    conv2: Conv2d,
    in_channels: usize,
    kind: ViewKind,
}

impl StModule {
    /// Create a module reading `in_channels` channels.
    ///
    /// For the node view `in_channels` is `len_seq * nb_flow`; for the edge
    /// view it is the embedding width.
    pub fn new(
        in_channels: usize,
        kind: ViewKind,
        nb_residual_unit: usize,
        vb: VarBuilder,
    ) -> MdlResult<Self> {
        if in_channels == 0 {
            return Err(MdlError::config("StModule in_channels must be > 0"));
        }

        let hidden = kind.hidden_channels();
        let cfg = conv3x3_config();

        let conv1 =
            candle_nn::conv2d(in_channels, hidden, 3, cfg, vb.pp("conv1")).map_err(map_candle)?;
        let layer1 = ResidualStack::new(hidden, nb_residual_unit, vb.pp("layer1"))?;
        let layer2 = ResidualStack::new(hidden, nb_residual_unit, vb.pp("layer2"))?;
        let layer3 = ResidualStack::new(hidden, nb_residual_unit, vb.pp("layer3"))?;
        let conv2 = candle_nn::conv2d(hidden, FUSED_CHANNELS, 3, cfg, vb.pp("conv2"))
            .map_err(map_candle)?;

        Ok(Self {
            conv1,
            layer1,
            layer2,
            layer3,
            conv2,
            in_channels,
            kind,
        })
    }

    #[inline]
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    #[inline]
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Forward pass: `(N, in_channels, H, W)` → `(N, 64, H, W)`.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> MdlResult<Tensor> {
        let (n, c, h, w) = x.dims4().map_err(map_candle)?;
        if c != self.in_channels {
            return Err(MdlError::shape(
                "spatio-temporal module input",
                &[n, self.in_channels, h, w],
                x.dims(),
            ));
        }

        let out = self.conv1.forward(x).map_err(map_candle)?;
        let out = out.relu().map_err(map_candle)?;
        let out = self.layer1.forward_t(&out, train)?;
        let out = self.layer2.forward_t(&out, train)?;
        let out = self.layer3.forward_t(&out, train)?;
        let out = self.conv2.forward(&out).map_err(map_candle)?;

        trace!(kind = ?self.kind, dims = ?out.dims(), "StModule forward");
        Ok(out)
    }
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Spatio-temporal module error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn build(in_channels: usize, kind: ViewKind) -> (StModule, VarMap) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let module = StModule::new(in_channels, kind, 1, vb).unwrap();
        (module, varmap)
    }

    #[test]
    fn test_output_is_64_for_any_input_width() {
        for (in_channels, kind) in [
            (2, ViewKind::Node),
            (6, ViewKind::Node),
            (16, ViewKind::Edge),
            (3, ViewKind::Edge),
        ] {
            let (module, _vm) = build(in_channels, kind);
            let x = Tensor::randn(0f32, 1f32, (2, in_channels, 4, 5), &Device::Cpu).unwrap();
            let out = module.forward_t(&x, false).unwrap();
            assert_eq!(out.dims(), &[2, FUSED_CHANNELS, 4, 5], "kind {:?}", kind);
        }
    }

    #[test]
    fn test_edge_hidden_width_is_128() {
        let (_module, varmap) = build(16, ViewKind::Edge);
        let data = varmap.data().lock().unwrap();
        assert_eq!(data["conv1.weight"].dims(), &[128, 16, 3, 3]);
        assert_eq!(data["conv2.weight"].dims(), &[64, 128, 3, 3]);
        assert!(data.contains_key("layer3.0.conv2.weight"));
    }

    #[test]
    fn test_input_width_checked() {
        let (module, _vm) = build(6, ViewKind::Node);
        let x = Tensor::zeros((1, 4, 4, 4), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            module.forward_t(&x, false),
            Err(MdlError::ShapeMismatch { .. })
        ));
    }
}
