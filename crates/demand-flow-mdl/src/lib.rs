//! Multi-view deep learning (MDL) model for grid demand forecasting.
//!
//! Predicts per-cell inflow/outflow (node view) and all-pairs cell
//! transitions (edge view) jointly from closeness, period and trend history,
//! with external covariates gating the predicted magnitude.
//!
//! # Architecture
//!
//! ```text
//!  node view (c,p,t)            edge view (c,p,t)
//!        │                            │
//!        │                     [1x1 embed x3]
//!        v                            v
//!  [StModule x3, 64]           [StModule x3, 128]
//!        │  w_c⊙c + w_p⊙p + w_t⊙t     │
//!        v                            v
//!   node features (64)          edge features (64)
//!         \                          /
//!          └──── bridge: concat | sum ┘
//!                       │
//!          ┌────────────┴────────────┐
//!     [node_conv → 2]        [edge_conv → 2·H·W]
//!          │                         │
//!   [external gate]           [external gate]
//!          v                         v
//!   node pred (N,2,H,W)     edge pred (N,2HW,H,W)
//! ```
//!
//! # Modules
//!
//! - [`config`]: `MdlConfig`, view tuples, bridge mode
//! - [`layers`]: residual block, spatio-temporal module, fusion network
//! - [`model`]: multi-view model, prediction heads, external gating, seeding
//! - [`training`]: multi-task loss, scalers, evaluation metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use candle_core::Device;
//! use demand_flow_mdl::{MdlConfig, MdlModel, Bridge};
//!
//! let config = MdlConfig::default().with_bridge(Bridge::Sum);
//! let (model, varmap) = MdlModel::with_varmap(config, &Device::Cpu)?;
//! let pred = model.forward(&node_input, &edge_input, None)?;
//! assert_eq!(pred.node.dims(), &[n, 2, 8, 8]);
//! ```

pub mod config;
pub mod error;
pub mod layers;
pub mod model;
pub mod training;
pub mod types;

pub use config::{Bridge, MdlConfig, ViewConf, ViewKind, ViewTriad};
pub use error::{MdlError, MdlResult};
pub use model::{ExternalGate, GateTarget, GatingState, MdlModel};
pub use training::{
    FlowMetrics, IdentityScaler, LossComponents, MinMaxScaler, MultiTaskLoss, MultiTaskOutput,
    Scaler,
};
pub use types::{MdlBatch, MdlPrediction, ViewInput};

/// Channel width of every fusion network output.
pub const FUSED_CHANNELS: usize = 64;

/// Hidden width of the external covariate projection.
pub const EXTERNAL_HIDDEN: usize = 10;

/// Node flow planes: outflow, inflow.
pub const NODE_FLOW_PLANES: usize = 2;
