//! Training-side components consumed by an external training loop.
//!
//! - [`loss`]: masked node/edge error plus flow-conservation penalty
//! - [`scaler`]: `Scaler` contract, min-max and identity scalers
//! - [`evaluation`]: RMSE / MAE on both targets

pub mod evaluation;
pub mod loss;
pub mod scaler;

pub use evaluation::{mae, rmse, FlowMetrics};
pub use loss::{
    conservation_penalty, indication_mask, masked_squared_error, LossComponents, MultiTaskLoss,
    MultiTaskOutput, W_EDGE, W_MDL, W_NODE,
};
pub use scaler::{IdentityScaler, MinMaxScaler, Scaler};
