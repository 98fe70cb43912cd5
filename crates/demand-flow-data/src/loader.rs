//! Shuffled mini-batches of MDL samples.

use candle_core::Tensor;
use demand_flow_mdl::{MdlBatch, ViewInput};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use crate::dataset::Dataset;
use crate::error::{DataError, DataResult};
use crate::mdl::{MdlDataset, MdlSample};

/// Data loader for MDL training with seeded shuffling and batching.
pub struct MdlDataLoader {
    dataset: MdlDataset,
    batch_size: usize,
    /// Sample indices this loader draws from, in current epoch order.
    indices: Vec<usize>,
    position: usize,
    rng: StdRng,
}

impl MdlDataLoader {
    /// Loader over every sample of `dataset`.
    pub fn new(dataset: MdlDataset, batch_size: usize, seed: u64) -> DataResult<Self> {
        let indices = (0..dataset.len()).collect();
        Self::with_indices(dataset, indices, batch_size, seed)
    }

    /// Loader over a subset of samples, e.g. one side of `MdlDataset::split_at`.
    pub fn with_indices(
        dataset: MdlDataset,
        indices: Vec<usize>,
        batch_size: usize,
        seed: u64,
    ) -> DataResult<Self> {
        if batch_size == 0 {
            return Err(DataError::config("[batch_size] must be > 0"));
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= dataset.len()) {
            return Err(DataError::IndexOutOfRange {
                index,
                len: dataset.len(),
            });
        }
        Ok(Self {
            dataset,
            batch_size,
            indices,
            position: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Number of samples per epoch.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of batches per epoch, counting a trailing partial batch.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn dataset(&self) -> &MdlDataset {
        &self.dataset
    }

    /// Shuffle indices for a new epoch.
    pub fn shuffle_epoch(&mut self) {
        self.indices.shuffle(&mut self.rng);
        self.position = 0;
        trace!(samples = self.indices.len(), "Shuffled epoch");
    }

    /// Restart the epoch without reshuffling.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Next batch, or `None` once the epoch is exhausted.
    pub fn next_batch(&mut self) -> DataResult<Option<MdlBatch>> {
        if self.position >= self.indices.len() {
            return Ok(None);
        }

        let end = (self.position + self.batch_size).min(self.indices.len());
        let samples = self.indices[self.position..end]
            .iter()
            .map(|&idx| self.dataset.get(idx))
            .collect::<DataResult<Vec<_>>>()?;
        self.position = end;

        collate(&samples).map(Some)
    }
}

/// Stack unbatched samples along a new leading batch axis.
pub fn collate(samples: &[MdlSample]) -> DataResult<MdlBatch> {
    if samples.is_empty() {
        return Err(DataError::config("cannot collate an empty batch"));
    }

    let external = match samples[0].external {
        Some(_) => {
            let parts = samples
                .iter()
                .map(|s| {
                    s.external.as_ref().ok_or_else(|| {
                        DataError::config(format!(
                            "sample for step {} has no external covariates",
                            s.target
                        ))
                    })
                })
                .collect::<DataResult<Vec<&Tensor>>>()?;
            Some(Tensor::stack(&parts, 0)?)
        }
        None => None,
    };

    Ok(MdlBatch {
        node: stack_view(samples, |s| &s.node)?,
        edge: stack_view(samples, |s| &s.edge)?,
        external,
        node_target: stack(samples, |s| &s.node_target)?,
        edge_target: stack(samples, |s| &s.edge_target)?,
    })
}

fn stack(samples: &[MdlSample], pick: impl Fn(&MdlSample) -> &Tensor) -> DataResult<Tensor> {
    let parts: Vec<&Tensor> = samples.iter().map(pick).collect();
    Ok(Tensor::stack(&parts, 0)?)
}

fn stack_view(
    samples: &[MdlSample],
    pick: impl Fn(&MdlSample) -> &ViewInput,
) -> DataResult<ViewInput> {
    Ok(ViewInput::new(
        stack(samples, |s| &pick(s).closeness)?,
        stack(samples, |s| &pick(s).period)?,
        stack(samples, |s| &pick(s).trend)?,
    ))
}
