//! Per-view fusion of closeness, period and trend features.
//!
//! ```text
//! closeness (N,Tc,C,H,W) ─ flatten ─ [embed_c] ─ c_module ─┐ ⊙ w_c
//! period    (N,Tp,C,H,W) ─ flatten ─ [embed_p] ─ p_module ─┤ ⊙ w_p ─ Σ → (N,64,H,W)
//! trend     (N,Tt,C,H,W) ─ flatten ─ [embed_t] ─ t_module ─┘ ⊙ w_t
//! ```
//!
//! The 1x1 embeddings exist only for the edge view, where `C = 2*H*W`.
//! The three modules never share weights.

use candle_core::Tensor;
use candle_nn::{Conv2d, Init, Module, VarBuilder};
use tracing::debug;

use crate::config::{ViewConf, ViewKind, ViewTriad};
use crate::error::{MdlError, MdlResult};
use crate::types::ViewInput;
use crate::FUSED_CHANNELS;

use super::StModule;

/// Fusion network for one view.
#[derive(Debug, Clone)]
pub struct FusionNet {
    w_c: Tensor,
    w_p: Tensor,
    w_t: Tensor,
    embed_c: Option<Conv2d>,
    embed_p: Option<Conv2d>,
    embed_t: Option<Conv2d>,
    c_module: StModule,
    p_module: StModule,
    t_module: StModule,
    triad: ViewTriad,
}

impl FusionNet {
    /// Build a fusion network for `triad`.
    ///
    /// `embed_dim` is used only when `kind` is [`ViewKind::Edge`].
    pub fn new(
        triad: ViewTriad,
        kind: ViewKind,
        embed_dim: usize,
        nb_residual_unit: usize,
        vb: VarBuilder,
    ) -> MdlResult<Self> {
        let (h, w) = triad.grid();
        let weight_init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        let w_c = vb
            .get_with_hints((FUSED_CHANNELS, h, w), "w_c", weight_init)
            .map_err(map_candle)?;
        let w_p = vb
            .get_with_hints((FUSED_CHANNELS, h, w), "w_p", weight_init)
            .map_err(map_candle)?;
        let w_t = vb
            .get_with_hints((FUSED_CHANNELS, h, w), "w_t", weight_init)
            .map_err(map_candle)?;

        let (embed_c, embed_p, embed_t) = match kind {
            ViewKind::Node => (None, None, None),
            ViewKind::Edge => (
                Some(embedding(&triad.closeness, embed_dim, vb.pp("embed_c"))?),
                Some(embedding(&triad.period, embed_dim, vb.pp("embed_p"))?),
                Some(embedding(&triad.trend, embed_dim, vb.pp("embed_t"))?),
            ),
        };

        let module_in = |conf: &ViewConf| match kind {
            ViewKind::Node => conf.stacked_channels(),
            ViewKind::Edge => embed_dim,
        };
        let c_module = StModule::new(
            module_in(&triad.closeness),
            kind,
            nb_residual_unit,
            vb.pp("c_module"),
        )?;
        let p_module = StModule::new(
            module_in(&triad.period),
            kind,
            nb_residual_unit,
            vb.pp("p_module"),
        )?;
        let t_module = StModule::new(
            module_in(&triad.trend),
            kind,
            nb_residual_unit,
            vb.pp("t_module"),
        )?;

        debug!(
            kind = ?kind,
            grid = ?(h, w),
            closeness = triad.closeness.len_seq,
            period = triad.period.len_seq,
            trend = triad.trend.len_seq,
            "Created FusionNet"
        );

        Ok(Self {
            w_c,
            w_p,
            w_t,
            embed_c,
            embed_p,
            embed_t,
            c_module,
            p_module,
            t_module,
            triad,
        })
    }

    /// Fuse the three granularities into `(N, 64, H, W)`.
    ///
    /// # Errors
    /// `MdlError::ShapeMismatch` if any input disagrees with its `ViewConf`
    /// or the batch sizes differ.
    pub fn forward_t(&self, input: &ViewInput, train: bool) -> MdlResult<Tensor> {
        let batch = input.closeness.dim(0).map_err(map_candle)?;

        let c = stack_frames(&input.closeness, &self.triad.closeness, batch, "closeness")?;
        let p = stack_frames(&input.period, &self.triad.period, batch, "period")?;
        let t = stack_frames(&input.trend, &self.triad.trend, batch, "trend")?;

        let c_out = self.branch(&c, self.embed_c.as_ref(), &self.c_module, train)?;
        let p_out = self.branch(&p, self.embed_p.as_ref(), &self.p_module, train)?;
        let t_out = self.branch(&t, self.embed_t.as_ref(), &self.t_module, train)?;

        let out = c_out
            .broadcast_mul(&self.w_c)
            .map_err(map_candle)?
            .add(&p_out.broadcast_mul(&self.w_p).map_err(map_candle)?)
            .map_err(map_candle)?;
        out.add(&t_out.broadcast_mul(&self.w_t).map_err(map_candle)?)
            .map_err(map_candle)
    }

    fn branch(
        &self,
        x: &Tensor,
        embed: Option<&Conv2d>,
        module: &StModule,
        train: bool,
    ) -> MdlResult<Tensor> {
        match embed {
            Some(conv) => {
                let embedded = conv.forward(x).map_err(map_candle)?;
                module.forward_t(&embedded, train)
            }
            None => module.forward_t(x, train),
        }
    }
}

/// 1x1 convolution `len_seq * nb_flow → embed_dim`, with bias.
fn embedding(conf: &ViewConf, embed_dim: usize, vb: VarBuilder) -> MdlResult<Conv2d> {
    candle_nn::conv2d(
        conf.stacked_channels(),
        embed_dim,
        1,
        Default::default(),
        vb,
    )
    .map_err(map_candle)
}

/// Check `(N, T, C, H, W)` against `conf` and flatten to `(N, T*C, H, W)`.
fn stack_frames(x: &Tensor, conf: &ViewConf, batch: usize, name: &str) -> MdlResult<Tensor> {
    let [t, c, h, w] = conf.sample_dims();
    let expected = [batch, t, c, h, w];
    if x.dims() != expected {
        return Err(MdlError::shape(format!("{} input", name), &expected, x.dims()));
    }
    x.reshape((batch, t * c, h, w)).map_err(map_candle)
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Fusion network error: {}", e),
    }
}
