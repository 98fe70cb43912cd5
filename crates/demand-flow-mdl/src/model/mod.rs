//! Multi-view model assembly.
//!
//! - [`mdl`]: `MdlModel`, the node/edge model with forward and loss entry points
//! - [`heads`]: bridge layer and node/edge prediction convolutions
//! - [`gating`]: external covariate gating, including the disabled state
//! - [`init`]: seeded re-initialization and parameter counting

pub mod gating;
pub mod heads;
pub mod init;
pub mod mdl;

pub use gating::{ExternalGate, GateTarget, GatingState};
pub use heads::{BridgeLayer, PredictionHeads};
pub use init::{param_count, reseed};
pub use mdl::MdlModel;
