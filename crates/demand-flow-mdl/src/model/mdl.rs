//! The multi-view model.

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use tracing::{debug, trace};

use crate::config::{Bridge, MdlConfig, ViewKind};
use crate::error::MdlResult;
use crate::layers::FusionNet;
use crate::training::{MultiTaskLoss, MultiTaskOutput, Scaler};
use crate::types::{MdlBatch, MdlPrediction, ViewInput};

use super::gating::{ExternalGate, GateTarget, GatingState};
use super::heads::{BridgeLayer, PredictionHeads};
use super::init::param_count;

/// Node-view and edge-view fusion networks joined by a bridge, two
/// prediction heads, and external gating.
///
/// Built once from a validated [`MdlConfig`]; the configuration cannot
/// change afterwards.
#[derive(Debug, Clone)]
pub struct MdlModel {
    node_net: FusionNet,
    edge_net: FusionNet,
    bridge: BridgeLayer,
    heads: PredictionHeads,
    gate: ExternalGate,
    config: MdlConfig,
}

impl MdlModel {
    /// Build the model, registering parameters under `vb`.
    ///
    /// # Errors
    /// `MdlError::ConfigError` if `config` fails validation.
    pub fn new(config: MdlConfig, vb: VarBuilder) -> MdlResult<Self> {
        config.validate()?;

        let grid = config.grid();
        let node_net = FusionNet::new(
            config.node_triad(),
            ViewKind::Node,
            config.embed_dim,
            config.nb_residual_unit,
            vb.pp("node_net"),
        )?;
        let edge_net = FusionNet::new(
            config.edge_triad(),
            ViewKind::Edge,
            config.embed_dim,
            config.nb_residual_unit,
            vb.pp("edge_net"),
        )?;
        let bridge = BridgeLayer::new(config.bridge, vb.clone())?;
        let heads = PredictionHeads::new(
            config.bridge.head_in_channels(),
            config.bridge,
            grid,
            vb.clone(),
        )?;
        let gate = ExternalGate::new(config.external_dim, grid, vb)?;

        debug!(
            grid = ?grid,
            bridge = %config.bridge,
            embed_dim = config.embed_dim,
            gating = ?gate.state(),
            "Created MdlModel"
        );

        Ok(Self {
            node_net,
            edge_net,
            bridge,
            heads,
            gate,
            config,
        })
    }

    /// Build the model with a fresh F32 `VarMap` on `device`.
    ///
    /// The returned `VarMap` owns every trainable parameter.
    pub fn with_varmap(config: MdlConfig, device: &Device) -> MdlResult<(Self, VarMap)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Self::new(config, vb)?;
        debug!(params = param_count(&varmap), "Allocated MdlModel parameters");
        Ok((model, varmap))
    }

    pub fn config(&self) -> &MdlConfig {
        &self.config
    }

    pub fn bridge(&self) -> Bridge {
        self.bridge.bridge()
    }

    pub fn gating_state(&self) -> GatingState {
        self.gate.state()
    }

    /// Inference-mode forward pass (batch norm uses running statistics).
    pub fn forward(
        &self,
        node: &ViewInput,
        edge: &ViewInput,
        x_ext: Option<&Tensor>,
    ) -> MdlResult<MdlPrediction> {
        self.forward_t(node, edge, x_ext, false)
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// * `node` - node view history, each granularity `(N, T_i, 2, H, W)`
    /// * `edge` - edge view history, each granularity `(N, T_i, 2*H*W, H, W)`
    /// * `x_ext` - external covariates `(N, F)`; ignored when gating is disabled
    /// * `train` - batch-norm mode
    ///
    /// # Returns
    /// Node prediction `(N, 2, H, W)` and edge prediction `(N, 2*H*W, H, W)`.
    pub fn forward_t(
        &self,
        node: &ViewInput,
        edge: &ViewInput,
        x_ext: Option<&Tensor>,
        train: bool,
    ) -> MdlResult<MdlPrediction> {
        let node_flow = self.node_net.forward_t(node, train)?;
        let edge_flow = self.edge_net.forward_t(edge, train)?;
        trace!(node = ?node_flow.dims(), edge = ?edge_flow.dims(), "Fused views");

        let fused = self.bridge.forward(&node_flow, &edge_flow)?;
        let (node_out, edge_out) = self.heads.forward(&fused)?;

        let node = self.gate.apply(x_ext, &node_out, GateTarget::Node)?;
        let edge = self.gate.apply(x_ext, &edge_out, GateTarget::Edge)?;

        Ok(MdlPrediction { node, edge })
    }

    /// Forward pass plus the multi-task loss with the default weights.
    ///
    /// Predictions are mapped back to physical units with the given scalers
    /// before the loss is taken; the returned predictions are in those units.
    pub fn multitask_loss(
        &self,
        batch: &MdlBatch,
        x_scaler: &dyn Scaler,
        m_scaler: &dyn Scaler,
        train: bool,
    ) -> MdlResult<MultiTaskOutput> {
        MultiTaskLoss.compute(self, batch, x_scaler, m_scaler, train)
    }
}
