//! DMVST-Net layout: local CNN patches, channel-first flow frames and a
//! topology embedding folded onto a `(th, tw)` plane.

use candle_core::Tensor;
use tracing::debug;

use crate::dataset::{check_index, Dataset};
use crate::error::{DataError, DataResult};

/// Default `(height, width)` of the topology (semantic view) plane.
pub const DEFAULT_TOPO_GRID: (usize, usize) = (10, 20);

/// One multi-view sample.
#[derive(Debug, Clone)]
pub struct DmvstNetSample {
    /// Local CNN patches, as stored.
    pub cnn: Tensor,
    /// Flow `(T, C, H, W)`.
    pub flow: Tensor,
    /// Topology embedding `(K, th, tw)`.
    pub topo: Tensor,
    /// Target, as stored.
    pub y: Tensor,
}

/// Spatial, temporal and semantic views for multi-view baselines.
///
/// Stored series, all with leading sample axis S:
/// - `cnn`: any layout, returned unchanged
/// - `flow`: `(S, T, H, W, C)`
/// - `topo`: `(S, a, b, c)`, returned as `(c, a, b)` folded into
///   `(-1, th, tw)` planes
/// - `y`: any layout, returned unchanged
#[derive(Debug, Clone)]
pub struct DmvstNetDataset {
    cnn: Tensor,
    flow: Tensor,
    topo: Tensor,
    y: Tensor,
    topo_grid: (usize, usize),
}

impl DmvstNetDataset {
    pub fn new(cnn: Tensor, flow: Tensor, topo: Tensor, y: Tensor) -> DataResult<Self> {
        let samples = cnn.dim(0)?;
        for (name, t) in [("flow", &flow), ("topo", &topo), ("y", &y)] {
            if t.dim(0)? != samples {
                return Err(DataError::config(format!(
                    "DMVST-Net {} holds {} samples, cnn holds {}",
                    name,
                    t.dim(0)?,
                    samples
                )));
            }
        }
        if flow.rank() != 5 {
            return Err(DataError::shape(
                "DMVST-Net flow (S, T, H, W, C)",
                &[samples, 0, 0, 0, 0],
                flow.dims(),
            ));
        }
        if topo.rank() != 4 {
            return Err(DataError::shape(
                "DMVST-Net topo (S, a, b, c)",
                &[samples, 0, 0, 0],
                topo.dims(),
            ));
        }

        let ds = Self {
            cnn,
            flow,
            topo,
            y,
            topo_grid: DEFAULT_TOPO_GRID,
        };
        ds.check_topo_grid()?;
        debug!(samples, topo_grid = ?ds.topo_grid, "DMVST-Net dataset");
        Ok(ds)
    }

    /// Fold topology embeddings into `th x tw` planes instead of the default.
    pub fn with_topo_grid(mut self, topo_grid: (usize, usize)) -> DataResult<Self> {
        self.topo_grid = topo_grid;
        self.check_topo_grid()?;
        Ok(self)
    }

    pub fn topo_grid(&self) -> (usize, usize) {
        self.topo_grid
    }

    fn check_topo_grid(&self) -> DataResult<()> {
        let (th, tw) = self.topo_grid;
        let per_sample: usize = self.topo.dims()[1..].iter().product();
        if th == 0 || tw == 0 || per_sample % (th * tw) != 0 {
            return Err(DataError::config(format!(
                "topology of {} values per sample cannot fold into {}x{} planes",
                per_sample, th, tw
            )));
        }
        Ok(())
    }
}

impl Dataset for DmvstNetDataset {
    type Item = DmvstNetSample;

    fn len(&self) -> usize {
        self.cnn.dims()[0]
    }

    fn get(&self, index: usize) -> DataResult<DmvstNetSample> {
        check_index(index, self.len())?;
        let (th, tw) = self.topo_grid;

        let flow = self.flow.get(index)?.permute((0, 3, 1, 2))?.contiguous()?;
        let topo = self.topo.get(index)?.permute((2, 0, 1))?.contiguous()?;
        let planes = topo.elem_count() / (th * tw);
        let topo = topo.reshape((planes, th, tw))?;

        Ok(DmvstNetSample {
            cnn: self.cnn.get(index)?,
            flow,
            topo,
            y: self.y.get(index)?,
        })
    }
}
