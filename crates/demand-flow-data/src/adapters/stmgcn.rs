//! STMGCN layout: one node per grid cell, `(T, H*W, 2)`.

use candle_core::Tensor;
use tracing::debug;

use super::{check_sample_count, grid_series_dims, GRID_FLOWS};
use crate::dataset::{check_index, Dataset};
use crate::error::DataResult;

/// Per-cell node features for graph-convolutional baselines.
///
/// Items are `(x, y)`, each `(T, H*W, 2)`.
#[derive(Debug, Clone)]
pub struct StmgcnDataset {
    x: Tensor,
    y: Tensor,
}

impl StmgcnDataset {
    /// Build from raw `(S, T, H*W*2)` input and target series.
    pub fn new(x: &Tensor, y: &Tensor, grid: (usize, usize)) -> DataResult<Self> {
        let x = to_nodes(x, grid, "STMGCN input")?;
        let y = to_nodes(y, grid, "STMGCN target")?;
        check_sample_count(x.dim(0)?, y.dim(0)?, "STMGCN")?;
        debug!(samples = x.dim(0)?, nodes = grid.0 * grid.1, "STMGCN dataset");
        Ok(Self { x, y })
    }
}

fn to_nodes(raw: &Tensor, grid: (usize, usize), context: &str) -> DataResult<Tensor> {
    let (s, t) = grid_series_dims(raw, grid, context)?;
    Ok(raw.reshape((s, t, grid.0 * grid.1, GRID_FLOWS))?)
}

impl Dataset for StmgcnDataset {
    type Item = (Tensor, Tensor);

    fn len(&self) -> usize {
        self.x.dims()[0]
    }

    fn get(&self, index: usize) -> DataResult<(Tensor, Tensor)> {
        check_index(index, self.len())?;
        Ok((self.x.get(index)?, self.y.get(index)?))
    }
}
