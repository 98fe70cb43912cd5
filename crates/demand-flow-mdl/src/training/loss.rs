//! Multi-task loss with flow conservation.
//!
//! Three components:
//! 1. Node loss: masked squared error on the inflow/outflow planes
//! 2. Edge loss: masked squared error on the transition channels
//! 3. Conservation: each cell's outflow (inflow) must equal the sum of its
//!    outgoing (incoming) transitions
//!
//! ```text
//! L = w_node·Σ P⊙(X − X̂)² + w_edge·Σ Q⊙(M − M̂)² + w_mdl·Σ(r_out² + r_in²)
//! P = 1[X > 0],  Q = 1[M > 0]
//! r_out = X[:,0] − Σ_{q<HW} M[:,q],   r_in = X[:,1] − Σ_{q≥HW} M[:,q]
//! ```
//!
//! The masks drop structurally empty cells (no trips) from the error terms.
//! The conservation term is taken on the ground truth.

use candle_core::Tensor;
use tracing::debug;

use crate::error::{MdlError, MdlResult};
use crate::model::MdlModel;
use crate::types::MdlBatch;

use super::Scaler;

/// Node loss weight.
pub const W_NODE: f32 = 1.0;
/// Edge loss weight.
pub const W_EDGE: f32 = 1.0;
/// Conservation loss weight.
pub const W_MDL: f32 = 0.0005;

/// Per-component loss values for logging.
#[derive(Debug, Clone, Default)]
pub struct LossComponents {
    /// Unweighted masked node error.
    pub node: f32,
    /// Unweighted masked edge error.
    pub edge: f32,
    /// Unweighted conservation residual.
    pub mdl: f32,
    /// Weighted total.
    pub total: f32,
}

/// Result of a loss evaluation.
#[derive(Debug, Clone)]
pub struct MultiTaskOutput {
    /// Scalar total loss (differentiable through the predictions).
    pub total: Tensor,
    /// Component values.
    pub components: LossComponents,
    /// Node prediction in physical units.
    pub node_pred: Tensor,
    /// Edge prediction in physical units.
    pub edge_pred: Tensor,
}

/// Multi-task loss over node and edge predictions.
///
/// Weights are fixed at [`W_NODE`], [`W_EDGE`] and [`W_MDL`], each applied
/// once to its component. With unit node and edge weights this equals the
/// form that scales the node and edge terms a second time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiTaskLoss;

impl MultiTaskLoss {
    /// Run `model` on `batch`, undo the scaling, and compute the loss.
    pub fn compute(
        &self,
        model: &MdlModel,
        batch: &MdlBatch,
        x_scaler: &dyn Scaler,
        m_scaler: &dyn Scaler,
        train: bool,
    ) -> MdlResult<MultiTaskOutput> {
        let pred = model.forward_t(&batch.node, &batch.edge, batch.external.as_ref(), train)?;

        let node_pred = x_scaler.inverse_transform(&pred.node)?;
        let edge_pred = m_scaler.inverse_transform(&pred.edge)?;

        let (total, components) =
            self.combine(&node_pred, &edge_pred, &batch.node_target, &batch.edge_target)?;

        debug!(
            node = components.node,
            edge = components.edge,
            mdl = components.mdl,
            total = components.total,
            "Multi-task loss"
        );

        Ok(MultiTaskOutput {
            total,
            components,
            node_pred,
            edge_pred,
        })
    }

    /// Loss from predictions already in physical units.
    ///
    /// # Arguments
    /// * `node_pred`, `x_gt` - `(N, 2, H, W)`
    /// * `edge_pred`, `m_gt` - `(N, 2*H*W, H, W)`
    pub fn combine(
        &self,
        node_pred: &Tensor,
        edge_pred: &Tensor,
        x_gt: &Tensor,
        m_gt: &Tensor,
    ) -> MdlResult<(Tensor, LossComponents)> {
        if node_pred.dims() != x_gt.dims() {
            return Err(MdlError::shape("node target", node_pred.dims(), x_gt.dims()));
        }
        if edge_pred.dims() != m_gt.dims() {
            return Err(MdlError::shape("edge target", edge_pred.dims(), m_gt.dims()));
        }

        let node_loss = masked_squared_error(x_gt, node_pred)?;
        let edge_loss = masked_squared_error(m_gt, edge_pred)?;
        let mdl_loss = conservation_penalty(x_gt, m_gt)?;

        let total = node_loss
            .affine(W_NODE as f64, 0.0)
            .map_err(map_candle)?
            .add(
                &edge_loss
                    .affine(W_EDGE as f64, 0.0)
                    .map_err(map_candle)?,
            )
            .map_err(map_candle)?
            .add(
                &mdl_loss
                    .affine(W_MDL as f64, 0.0)
                    .map_err(map_candle)?,
            )
            .map_err(map_candle)?;

        let components = LossComponents {
            node: tensor_to_f32(&node_loss)?,
            edge: tensor_to_f32(&edge_loss)?,
            mdl: tensor_to_f32(&mdl_loss)?,
            total: tensor_to_f32(&total)?,
        };

        Ok((total, components))
    }
}

/// Indication matrix: 1 where `gt > 0`, else 0, in `gt`'s dtype.
pub fn indication_mask(gt: &Tensor) -> MdlResult<Tensor> {
    let zeros = gt.zeros_like().map_err(map_candle)?;
    gt.gt(&zeros)
        .map_err(map_candle)?
        .to_dtype(gt.dtype())
        .map_err(map_candle)
}

/// `Σ mask(gt) ⊙ (gt − pred)²` as a scalar tensor.
pub fn masked_squared_error(gt: &Tensor, pred: &Tensor) -> MdlResult<Tensor> {
    let mask = indication_mask(gt)?;
    let diff = gt.sub(pred).map_err(map_candle)?;
    mask.mul(&diff.sqr().map_err(map_candle)?)
        .map_err(map_candle)?
        .sum_all()
        .map_err(map_candle)
}

/// Conservation residual between node flow and transition sums.
///
/// The transition axis of `m_gt` is split at `H*W`: channels below the
/// midpoint are a cell's outgoing transitions, the rest its incoming ones.
pub fn conservation_penalty(x_gt: &Tensor, m_gt: &Tensor) -> MdlResult<Tensor> {
    let (n, planes, h, w) = x_gt.dims4().map_err(map_candle)?;
    let hw = h * w;
    if planes != 2 {
        return Err(MdlError::shape("conservation node target", &[n, 2, h, w], x_gt.dims()));
    }
    if m_gt.dims() != [n, 2 * hw, h, w] {
        return Err(MdlError::shape(
            "conservation edge target",
            &[n, 2 * hw, h, w],
            m_gt.dims(),
        ));
    }

    let outgoing = m_gt.narrow(1, 0, hw).map_err(map_candle)?.sum(1).map_err(map_candle)?;
    let incoming = m_gt.narrow(1, hw, hw).map_err(map_candle)?.sum(1).map_err(map_candle)?;
    let outflow = x_gt.narrow(1, 0, 1).map_err(map_candle)?.squeeze(1).map_err(map_candle)?;
    let inflow = x_gt.narrow(1, 1, 1).map_err(map_candle)?.squeeze(1).map_err(map_candle)?;

    let out_res = outflow.sub(&outgoing).map_err(map_candle)?;
    let in_res = inflow.sub(&incoming).map_err(map_candle)?;

    out_res
        .sqr()
        .map_err(map_candle)?
        .add(&in_res.sqr().map_err(map_candle)?)
        .map_err(map_candle)?
        .sum_all()
        .map_err(map_candle)
}

/// Extract a scalar f32 from a 0-dim or 1-element tensor.
fn tensor_to_f32(t: &Tensor) -> MdlResult<f32> {
    let flat = t
        .to_dtype(candle_core::DType::F32)
        .map_err(map_candle)?
        .flatten_all()
        .map_err(map_candle)?;
    Ok(flat.to_vec1::<f32>().map_err(map_candle)?[0])
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Loss computation error: {}", e),
    }
}
