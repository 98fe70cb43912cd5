//! ConvLSTM layout: flattened grid steps folded back into `(T, 2, H, W)` frames.

use candle_core::Tensor;
use tracing::debug;

use super::{check_sample_count, grid_series_dims, GRID_FLOWS};
use crate::dataset::{check_index, Dataset};
use crate::error::DataResult;

/// Grid frames for convolutional recurrent baselines.
///
/// Items are `(x, y)`, each `(T, 2, H, W)`.
#[derive(Debug, Clone)]
pub struct ConvLstmDataset {
    x: Tensor,
    y: Tensor,
}

impl ConvLstmDataset {
    /// Build from raw `(S, T, H*W*2)` input and target series.
    pub fn new(x: &Tensor, y: &Tensor, grid: (usize, usize)) -> DataResult<Self> {
        let x = to_frames(x, grid, "ConvLSTM input")?;
        let y = to_frames(y, grid, "ConvLSTM target")?;
        check_sample_count(x.dim(0)?, y.dim(0)?, "ConvLSTM")?;
        debug!(samples = x.dim(0)?, x = ?x.dims(), y = ?y.dims(), "ConvLSTM dataset");
        Ok(Self { x, y })
    }
}

/// `(S, T, H*W*2)` → `(S, T, 2, H, W)`.
fn to_frames(raw: &Tensor, grid: (usize, usize), context: &str) -> DataResult<Tensor> {
    let (s, t) = grid_series_dims(raw, grid, context)?;
    let (h, w) = grid;
    Ok(raw
        .reshape((s, t, h, w, GRID_FLOWS))?
        .permute((0, 1, 4, 2, 3))?
        .contiguous()?)
}

impl Dataset for ConvLstmDataset {
    type Item = (Tensor, Tensor);

    fn len(&self) -> usize {
        self.x.dims()[0]
    }

    fn get(&self, index: usize) -> DataResult<(Tensor, Tensor)> {
        check_index(index, self.len())?;
        Ok((self.x.get(index)?, self.y.get(index)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use candle_core::{DType, Device};

    #[test]
    fn test_frames_layout() {
        // one sample, one step, 2x3 grid: value = cell * 2 + flow
        let raw = Tensor::arange(0f32, 12f32, &Device::Cpu)
            .unwrap()
            .reshape((1, 1, 12))
            .unwrap();
        let ds = ConvLstmDataset::new(&raw, &raw, (2, 3)).unwrap();
        let (x, y) = ds.get(0).unwrap();
        assert_eq!(x.dims(), &[1, 2, 2, 3]);
        assert_eq!(y.dims(), x.dims());

        let outflow: Vec<Vec<f32>> = x.get(0).unwrap().get(0).unwrap().to_vec2().unwrap();
        let inflow: Vec<Vec<f32>> = x.get(0).unwrap().get(1).unwrap().to_vec2().unwrap();
        assert_eq!(outflow, vec![vec![0.0, 2.0, 4.0], vec![6.0, 8.0, 10.0]]);
        assert_eq!(inflow, vec![vec![1.0, 3.0, 5.0], vec![7.0, 9.0, 11.0]]);
    }

    #[test]
    fn test_wrong_grid_rejected() {
        let raw = Tensor::zeros((2, 4, 50), DType::F32, &Device::Cpu).unwrap();
        let err = ConvLstmDataset::new(&raw, &raw, (5, 6)).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_len_and_bounds() {
        let x = Tensor::zeros((3, 4, 2 * 2 * 2), DType::F32, &Device::Cpu).unwrap();
        let y = Tensor::zeros((3, 1, 2 * 2 * 2), DType::F32, &Device::Cpu).unwrap();
        let ds = ConvLstmDataset::new(&x, &y, (2, 2)).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(2).unwrap().1.dims(), &[1, 2, 2, 2]);
        assert!(ds.get(3).is_err());
    }
}
