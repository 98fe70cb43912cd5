//! End-to-end tests: config → model → forward → multi-task loss.
//!
//! Grid is 8x8, so the edge view carries 2*8*8 = 128 transition channels.

use candle_core::{DType, Device, Tensor};
use demand_flow_mdl::{
    model::reseed, Bridge, GatingState, IdentityScaler, MdlBatch, MdlConfig, MdlError, MdlModel,
    MinMaxScaler, ViewConf, ViewInput, ViewTriad,
};

// =============================================================================
// HELPERS
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn view(triad: &ViewTriad, n: usize, zeros: bool) -> ViewInput {
    let make = |c: &ViewConf| {
        let shape = (n, c.len_seq, c.nb_flow, c.map_height, c.map_width);
        if zeros {
            Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap()
        } else {
            Tensor::rand(0f32, 1f32, shape, &Device::Cpu).unwrap()
        }
    };
    ViewInput::new(make(&triad.closeness), make(&triad.period), make(&triad.trend))
}

fn grid_config(bridge: Bridge) -> MdlConfig {
    let config = MdlConfig::for_grid(8, 8, (3, 1, 1)).with_bridge(bridge);
    assert_eq!(config.embed_dim, 16);
    assert_eq!(config.external_dim, None);
    config
}

fn max_abs(t: &Tensor) -> f32 {
    t.abs().unwrap().max_all().unwrap().to_scalar().unwrap()
}

// =============================================================================
// FORWARD
// =============================================================================

#[test]
fn test_zero_input_sum_bridge_shapes() {
    init_tracing();
    let config = grid_config(Bridge::Sum);
    assert_eq!(config.node_conf, ViewConf::new(3, 2, 8, 8));
    assert_eq!(config.edge_conf, ViewConf::new(3, 128, 8, 8));

    let (model, _varmap) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    let n = 2;
    let pred = model
        .forward(
            &view(&config.node_triad(), n, true),
            &view(&config.edge_triad(), n, true),
            None,
        )
        .unwrap();

    assert_eq!(pred.node.dims(), &[n, 2, 8, 8]);
    assert_eq!(pred.edge.dims(), &[n, 128, 8, 8]);
    assert!(matches!(model.gating_state(), GatingState::Disabled { configured: None }));
    // tanh output
    assert!(max_abs(&pred.node) <= 1.0);
    assert!(max_abs(&pred.edge) <= 1.0);
}

#[test]
fn test_concat_bridge_shapes_with_gating() {
    init_tracing();
    let config = grid_config(Bridge::Concat).with_external_dim(Some(5));
    let (model, _varmap) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    let x_ext = Tensor::rand(0f32, 1f32, (1, 5), &Device::Cpu).unwrap();

    let node = view(&config.node_triad(), 1, false);
    let edge = view(&config.edge_triad(), 1, false);
    let pred = model.forward(&node, &edge, Some(&x_ext)).unwrap();
    assert_eq!(pred.node.dims(), &[1, 2, 8, 8]);
    assert_eq!(pred.edge.dims(), &[1, 128, 8, 8]);

    let err = model.forward(&node, &edge, None).unwrap_err();
    assert!(matches!(err, MdlError::MissingExternal { external_dim: 5 }));
}

#[test]
fn test_reseed_makes_models_identical() {
    init_tracing();
    let config = grid_config(Bridge::Sum);
    let (a, varmap_a) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    let (b, varmap_b) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();

    let count_a = reseed(&varmap_a, 2024).unwrap();
    let count_b = reseed(&varmap_b, 2024).unwrap();
    assert_eq!(count_a, count_b);
    assert!(count_a > 0);

    let node = view(&config.node_triad(), 1, false);
    let edge = view(&config.edge_triad(), 1, false);
    let pa = a.forward(&node, &edge, None).unwrap();
    let pb = b.forward(&node, &edge, None).unwrap();

    let diff = |x: &Tensor, y: &Tensor| max_abs(&x.sub(y).unwrap());
    assert_eq!(diff(&pa.node, &pb.node), 0.0);
    assert_eq!(diff(&pa.edge, &pb.edge), 0.0);
}

#[test]
fn test_reseed_zero_inputs_deterministic() {
    init_tracing();
    let config = grid_config(Bridge::Sum);
    let (a, varmap_a) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    let (b, varmap_b) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    reseed(&varmap_a, 7).unwrap();
    reseed(&varmap_b, 7).unwrap();

    let node = view(&config.node_triad(), 2, true);
    let edge = view(&config.edge_triad(), 2, true);
    let pa = a.forward(&node, &edge, None).unwrap();
    let pb = b.forward(&node, &edge, None).unwrap();

    assert_eq!(pa.node.dims(), &[2, 2, 8, 8]);
    assert_eq!(pa.edge.dims(), &[2, 128, 8, 8]);
    assert_eq!(max_abs(&pa.node.sub(&pb.node).unwrap()), 0.0);
    assert_eq!(max_abs(&pa.edge.sub(&pb.edge).unwrap()), 0.0);
}

// =============================================================================
// LOSS
// =============================================================================

#[test]
fn test_multitask_loss_on_zero_batch() {
    init_tracing();
    let config = grid_config(Bridge::Sum);
    let (model, _varmap) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();
    let n = 2;

    let batch = MdlBatch {
        node: view(&config.node_triad(), n, true),
        edge: view(&config.edge_triad(), n, true),
        external: None,
        node_target: Tensor::zeros((n, 2, 8, 8), DType::F32, &Device::Cpu).unwrap(),
        edge_target: Tensor::zeros((n, 128, 8, 8), DType::F32, &Device::Cpu).unwrap(),
    };

    let out = model
        .multitask_loss(&batch, &IdentityScaler, &IdentityScaler, true)
        .unwrap();

    // zero ground truth masks every position
    assert_eq!(out.components.node, 0.0);
    assert_eq!(out.components.edge, 0.0);
    assert_eq!(out.components.mdl, 0.0);
    assert_eq!(out.components.total, 0.0);
    assert_eq!(out.node_pred.dims(), &[n, 2, 8, 8]);
    assert_eq!(out.edge_pred.dims(), &[n, 128, 8, 8]);
}

#[test]
fn test_multitask_loss_rescales_predictions() {
    init_tracing();
    let config = grid_config(Bridge::Concat);
    let (model, _varmap) = MdlModel::with_varmap(config.clone(), &Device::Cpu).unwrap();

    let node_target = Tensor::rand(0f32, 50f32, (1, 2, 8, 8), &Device::Cpu).unwrap();
    let edge_target = Tensor::rand(0f32, 10f32, (1, 128, 8, 8), &Device::Cpu).unwrap();
    let x_scaler = MinMaxScaler::new(0.0, 50.0).unwrap();
    let m_scaler = MinMaxScaler::new(0.0, 10.0).unwrap();

    let batch = MdlBatch {
        node: view(&config.node_triad(), 1, false),
        edge: view(&config.edge_triad(), 1, false),
        external: None,
        node_target,
        edge_target,
    };
    let out = model.multitask_loss(&batch, &x_scaler, &m_scaler, false).unwrap();

    // predictions are back in physical units: tanh range maps to [min, max]
    let node_max: f32 = out.node_pred.max_all().unwrap().to_scalar().unwrap();
    let node_min: f32 = out.node_pred.min_all().unwrap().to_scalar().unwrap();
    assert!(node_min >= -1e-3 && node_max <= 50.0 + 1e-3);
    assert!(out.components.node > 0.0);
    assert!(out.components.total.is_finite());
    let expected = out.components.node + out.components.edge + 0.0005 * out.components.mdl;
    assert!((out.components.total - expected).abs() <= 1e-3 * expected.max(1.0));
}

#[test]
fn test_config_file_round_trip_builds_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mdl.toml");
    let config = grid_config(Bridge::Sum);
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    let loaded = MdlConfig::from_file(&path).unwrap();
    assert_eq!(loaded.bridge, Bridge::Sum);
    let (model, _varmap) = MdlModel::with_varmap(loaded, &Device::Cpu).unwrap();
    assert_eq!(model.bridge(), Bridge::Sum);
}
