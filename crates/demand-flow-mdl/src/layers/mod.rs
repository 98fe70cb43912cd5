//! Spatial feature extractors shared by both views.
//!
//! - [`ResidualBlock`] / [`ResidualStack`]: constant-width residual units
//! - [`StModule`]: projection → three residual stacks → 64-channel output
//! - [`FusionNet`]: three `StModule`s fused with learned per-pixel weights

pub mod fusion;
pub mod residual;
pub mod st_module;

pub use fusion::FusionNet;
pub use residual::{ResidualBlock, ResidualStack};
pub use st_module::StModule;

use candle_nn::Conv2dConfig;

/// Batch-norm epsilon.
pub(crate) const BN_EPS: f64 = 1e-5;

/// 3x3, stride 1, padding 1: spatial size preserved.
pub(crate) fn conv3x3_config() -> Conv2dConfig {
    Conv2dConfig {
        padding: 1,
        stride: 1,
        ..Default::default()
    }
}
