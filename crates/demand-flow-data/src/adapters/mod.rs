//! Adapters reshaping raw grid series for other forecasting baselines.
//!
//! Raw input/target series are `(S, T, H*W*2)`: S samples of T steps, each
//! step a flattened grid in cell-major, flow-minor order.
//!
//! | Adapter | Item layout |
//! |---------|-------------|
//! | [`ConvLstmDataset`] | `(T, 2, H, W)` |
//! | [`StmgcnDataset`] | `(T, H*W, 2)` |
//! | [`DmvstNetDataset`] | cnn / flow `(T, C, H, W)` / topo `(K, th, tw)` / y |

mod conv_lstm;
mod dmvst_net;
mod stmgcn;

pub use conv_lstm::ConvLstmDataset;
pub use dmvst_net::{DmvstNetDataset, DmvstNetSample, DEFAULT_TOPO_GRID};
pub use stmgcn::StmgcnDataset;

use candle_core::Tensor;

use crate::error::{DataError, DataResult};

/// Number of flow planes (outflow, inflow) in raw grid series.
pub const GRID_FLOWS: usize = 2;

/// Check a raw `(S, T, ...)` series holds `h*w*2` values per step and return
/// `(S, T)`.
pub(crate) fn grid_series_dims(
    raw: &Tensor,
    grid: (usize, usize),
    context: &str,
) -> DataResult<(usize, usize)> {
    let dims = raw.dims();
    let per_step = grid.0 * grid.1 * GRID_FLOWS;
    if dims.len() < 3 {
        return Err(DataError::shape(context, &[0, 0, per_step], dims));
    }
    let (s, t) = (dims[0], dims[1]);
    let actual: usize = dims[2..].iter().product();
    if actual != per_step {
        return Err(DataError::shape(context, &[s, t, per_step], dims));
    }
    Ok((s, t))
}

/// Input and target series must hold the same number of samples.
pub(crate) fn check_sample_count(x: usize, y: usize, context: &str) -> DataResult<()> {
    if x != y {
        return Err(DataError::config(format!(
            "{}: {} input samples but {} targets",
            context, x, y
        )));
    }
    Ok(())
}
