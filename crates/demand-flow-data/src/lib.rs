//! Dataset adapters and batching for grid demand forecasting models.
//!
//! # Modules
//!
//! - [`dataset`]: `Dataset` trait, indexed sample access
//! - [`transitions`]: node/edge views from an origin–destination series
//! - [`mdl`]: closeness/period/trend sampling for the multi-view model
//! - [`loader`]: seeded shuffling and collation into `MdlBatch`
//! - [`adapters`]: layouts for ConvLSTM, STMGCN and DMVST-Net baselines
//!
//! # Example
//!
//! ```no_run
//! use candle_core::{Device, Tensor};
//! use demand_flow_data::{MdlDataLoader, MdlDataset, TemporalSampler};
//! use demand_flow_mdl::{IdentityScaler, MdlModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let od = Tensor::zeros((400, 64, 64), candle_core::DType::F32, &Device::Cpu)?;
//! let dataset = MdlDataset::from_od(&od, (8, 8), None, TemporalSampler::default())?;
//! let (model, _varmap) = MdlModel::with_varmap(dataset.model_config(), &Device::Cpu)?;
//!
//! let mut loader = MdlDataLoader::new(dataset, 16, 7)?;
//! loader.shuffle_epoch();
//! while let Some(batch) = loader.next_batch()? {
//!     let out = model.multitask_loss(&batch, &IdentityScaler, &IdentityScaler, true)?;
//!     println!("loss = {}", out.components.total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod mdl;
pub mod transitions;

pub use adapters::{ConvLstmDataset, DmvstNetDataset, DmvstNetSample, StmgcnDataset};
pub use dataset::Dataset;
pub use error::{DataError, DataResult};
pub use loader::{collate, MdlDataLoader};
pub use mdl::{MdlDataset, MdlSample, SampleIndices, TemporalSampler};
pub use transitions::TransitionViews;
