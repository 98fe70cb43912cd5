//! Node and edge views derived from an origin–destination series.
//!
//! ```text
//! od[t, o, d]                       trips from cell o to cell d, (T, HW, HW)
//! node[t, 0, p] = Σ_d od[t, p, d]   outflow
//! node[t, 1, p] = Σ_o od[t, o, p]   inflow
//! edge[t, q, p]      = od[t, p, q]  outgoing, q < HW
//! edge[t, HW + q, p] = od[t, q, p]  incoming
//! ```
//!
//! Summing the first (second) half of the edge channels at a cell gives its
//! outflow (inflow), so views built here have zero conservation residual.

use candle_core::Tensor;
use tracing::debug;

use crate::error::{DataError, DataResult};

/// Node `(T, 2, H, W)` and edge `(T, 2*H*W, H, W)` series.
#[derive(Debug, Clone)]
pub struct TransitionViews {
    pub node: Tensor,
    pub edge: Tensor,
}

/// Build both views from `od` of shape `(T, H*W, H*W)`.
pub fn from_od(od: &Tensor, grid: (usize, usize)) -> DataResult<TransitionViews> {
    let views = TransitionViews {
        node: node_flow(od, grid)?,
        edge: edge_flow(od, grid)?,
    };
    debug!(node = ?views.node.dims(), edge = ?views.edge.dims(), "Transition views");
    Ok(views)
}

/// Outflow and inflow planes, `(T, 2, H, W)`.
pub fn node_flow(od: &Tensor, grid: (usize, usize)) -> DataResult<Tensor> {
    let t = check_od(od, grid)?;
    let (h, w) = grid;
    let outflow = od.sum(2)?.reshape((t, 1, h, w))?;
    let inflow = od.sum(1)?.reshape((t, 1, h, w))?;
    Ok(Tensor::cat(&[&outflow, &inflow], 1)?)
}

/// Outgoing then incoming transition channels per cell, `(T, 2*H*W, H, W)`.
pub fn edge_flow(od: &Tensor, grid: (usize, usize)) -> DataResult<Tensor> {
    let t = check_od(od, grid)?;
    let (h, w) = grid;
    let hw = h * w;
    // channel axis before the spatial one: outgoing needs od[p, q] at (q, p)
    let outgoing = od.transpose(1, 2)?;
    Ok(Tensor::cat(&[&outgoing, od], 1)?
        .contiguous()?
        .reshape((t, 2 * hw, h, w))?)
}

fn check_od(od: &Tensor, grid: (usize, usize)) -> DataResult<usize> {
    let hw = grid.0 * grid.1;
    match od.dims() {
        &[t, o, d] if o == hw && d == hw => Ok(t),
        dims => Err(DataError::shape("origin-destination series", &[0, hw, hw], dims)),
    }
}
