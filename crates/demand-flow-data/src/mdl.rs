//! Closeness / period / trend samples for the multi-view model.
//!
//! For a target step `t` the sampler picks, oldest first:
//!
//! ```text
//! closeness: t - len_c, ..., t - 1
//! period:    t - len_p * P, ..., t - P        P = period_interval
//! trend:     t - len_t * Q, ..., t - Q        Q = trend_interval
//! ```

use candle_core::{Device, Tensor};
use demand_flow_mdl::{MdlConfig, ViewInput};
use tracing::debug;

use crate::dataset::{check_index, Dataset};
use crate::error::{DataError, DataResult};
use crate::transitions;

/// Steps per day at hourly resolution.
pub const DEFAULT_PERIOD_INTERVAL: usize = 24;
/// Steps per week at hourly resolution.
pub const DEFAULT_TREND_INTERVAL: usize = 24 * 7;

/// History selection for one target step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalSampler {
    pub len_closeness: usize,
    pub len_period: usize,
    pub len_trend: usize,
    pub period_interval: usize,
    pub trend_interval: usize,
}

impl Default for TemporalSampler {
    fn default() -> Self {
        Self {
            len_closeness: 3,
            len_period: 1,
            len_trend: 1,
            period_interval: DEFAULT_PERIOD_INTERVAL,
            trend_interval: DEFAULT_TREND_INTERVAL,
        }
    }
}

/// Step indices of one sample, each list oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndices {
    pub closeness: Vec<usize>,
    pub period: Vec<usize>,
    pub trend: Vec<usize>,
}

impl TemporalSampler {
    /// Sampler with the default intervals.
    pub fn new(len_closeness: usize, len_period: usize, len_trend: usize) -> Self {
        Self {
            len_closeness,
            len_period,
            len_trend,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_intervals(mut self, period_interval: usize, trend_interval: usize) -> Self {
        self.period_interval = period_interval;
        self.trend_interval = trend_interval;
        self
    }

    /// `(closeness, period, trend)` lengths, the form `MdlConfig::for_grid` takes.
    pub fn lens(&self) -> (usize, usize, usize) {
        (self.len_closeness, self.len_period, self.len_trend)
    }

    pub fn validate(&self) -> DataResult<()> {
        let fields = [
            ("len_closeness", self.len_closeness),
            ("len_period", self.len_period),
            ("len_trend", self.len_trend),
            ("period_interval", self.period_interval),
            ("trend_interval", self.trend_interval),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(DataError::config(format!("[{}] must be > 0", name)));
            }
        }
        Ok(())
    }

    /// Earliest target step with complete history.
    pub fn first_valid(&self) -> usize {
        self.len_closeness
            .max(self.len_period * self.period_interval)
            .max(self.len_trend * self.trend_interval)
    }

    /// History indices for `target`.
    ///
    /// # Errors
    /// `DataError::InsufficientHistory` when `target < first_valid()`.
    pub fn indices(&self, target: usize) -> DataResult<SampleIndices> {
        let first_valid = self.first_valid();
        if target < first_valid {
            return Err(DataError::InsufficientHistory {
                target,
                first_valid,
            });
        }
        let lagged = |len: usize, step: usize| -> Vec<usize> {
            (1..=len).rev().map(|k| target - k * step).collect()
        };
        Ok(SampleIndices {
            closeness: lagged(self.len_closeness, 1),
            period: lagged(self.len_period, self.period_interval),
            trend: lagged(self.len_trend, self.trend_interval),
        })
    }
}

/// One unbatched sample.
///
/// The `ViewInput`s here hold `(T_i, C, H, W)` tensors; the loader adds the
/// batch axis.
#[derive(Debug, Clone)]
pub struct MdlSample {
    /// Target step in the underlying series.
    pub target: usize,
    pub node: ViewInput,
    pub edge: ViewInput,
    /// Covariates at the target step, `(F,)`.
    pub external: Option<Tensor>,
    /// `(2, H, W)`
    pub node_target: Tensor,
    /// `(2*H*W, H, W)`
    pub edge_target: Tensor,
}

/// Node and edge series with optional per-step covariates.
#[derive(Debug, Clone)]
pub struct MdlDataset {
    node: Tensor,
    edge: Tensor,
    external: Option<Tensor>,
    sampler: TemporalSampler,
    grid: (usize, usize),
    steps: usize,
}

impl MdlDataset {
    /// # Arguments
    /// * `node` - `(T, 2, H, W)`
    /// * `edge` - `(T, 2*H*W, H, W)`
    /// * `external` - `(T, F)` covariates
    pub fn new(
        node: Tensor,
        edge: Tensor,
        external: Option<Tensor>,
        sampler: TemporalSampler,
    ) -> DataResult<Self> {
        sampler.validate()?;

        let (steps, planes, h, w) = node.dims4()?;
        if planes != 2 {
            return Err(DataError::shape("node series", &[steps, 2, h, w], node.dims()));
        }
        let edge_dims = [steps, 2 * h * w, h, w];
        if edge.dims() != edge_dims {
            return Err(DataError::shape("edge series", &edge_dims, edge.dims()));
        }
        if let Some(x) = &external {
            let (t, f) = x.dims2()?;
            if t != steps {
                return Err(DataError::shape("external covariates", &[steps, f], x.dims()));
            }
        }

        let first_valid = sampler.first_valid();
        if steps <= first_valid {
            return Err(DataError::config(format!(
                "series of {} steps is too short: first valid target is step {}",
                steps, first_valid
            )));
        }

        debug!(
            steps,
            grid = ?(h, w),
            first_valid,
            samples = steps - first_valid,
            external = external.as_ref().map(|x| x.dims()[1]),
            "MDL dataset"
        );

        Ok(Self {
            node,
            edge,
            external,
            sampler,
            grid: (h, w),
            steps,
        })
    }

    /// Build from an origin–destination series `(T, H*W, H*W)`.
    pub fn from_od(
        od: &Tensor,
        grid: (usize, usize),
        external: Option<Tensor>,
        sampler: TemporalSampler,
    ) -> DataResult<Self> {
        let views = transitions::from_od(od, grid)?;
        Self::new(views.node, views.edge, external, sampler)
    }

    pub fn grid(&self) -> (usize, usize) {
        self.grid
    }

    pub fn sampler(&self) -> &TemporalSampler {
        &self.sampler
    }

    pub fn device(&self) -> &Device {
        self.node.device()
    }

    /// Covariate width, if covariates are present.
    pub fn external_dim(&self) -> Option<usize> {
        self.external.as_ref().map(|x| x.dims()[1])
    }

    /// Model configuration whose view shapes match this dataset's samples.
    pub fn model_config(&self) -> MdlConfig {
        let (h, w) = self.grid;
        MdlConfig::for_grid(h, w, self.sampler.lens()).with_external_dim(self.external_dim())
    }

    /// Full node series, e.g. for fitting a scaler.
    pub fn node_series(&self) -> &Tensor {
        &self.node
    }

    /// Full edge series.
    pub fn edge_series(&self) -> &Tensor {
        &self.edge
    }

    /// Chronological split: samples before `index` and from `index` on.
    pub fn split_at(&self, index: usize) -> DataResult<(Vec<usize>, Vec<usize>)> {
        if index > self.len() {
            return Err(DataError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(((0..index).collect(), (index..self.len()).collect()))
    }

    fn select(series: &Tensor, steps: &[usize]) -> DataResult<Tensor> {
        let idx: Vec<u32> = steps.iter().map(|&s| s as u32).collect();
        let idx = Tensor::new(idx.as_slice(), series.device())?;
        Ok(series.index_select(&idx, 0)?)
    }

    fn view(series: &Tensor, indices: &SampleIndices) -> DataResult<ViewInput> {
        Ok(ViewInput::new(
            Self::select(series, &indices.closeness)?,
            Self::select(series, &indices.period)?,
            Self::select(series, &indices.trend)?,
        ))
    }
}

impl Dataset for MdlDataset {
    type Item = MdlSample;

    fn len(&self) -> usize {
        self.steps - self.sampler.first_valid()
    }

    fn get(&self, index: usize) -> DataResult<MdlSample> {
        check_index(index, self.len())?;
        let target = self.sampler.first_valid() + index;
        let indices = self.sampler.indices(target)?;

        Ok(MdlSample {
            target,
            node: Self::view(&self.node, &indices)?,
            edge: Self::view(&self.edge, &indices)?,
            external: self.external.as_ref().map(|x| x.get(target)).transpose()?,
            node_target: self.node.get(target)?,
            edge_target: self.edge.get(target)?,
        })
    }
}
