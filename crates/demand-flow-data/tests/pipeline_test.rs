//! OD series → dataset → loader → model → loss.

use candle_core::{DType, Device, Tensor};
use demand_flow_data::{Dataset, MdlDataLoader, MdlDataset, TemporalSampler};
use demand_flow_mdl::{Bridge, IdentityScaler, MdlModel, MinMaxScaler, Scaler, ViewInput};

const GRID: (usize, usize) = (3, 3);

fn od_series(steps: usize) -> Tensor {
    let hw = GRID.0 * GRID.1;
    Tensor::rand(0f32, 6f32, (steps, hw, hw), &Device::Cpu)
        .unwrap()
        .floor()
        .unwrap()
}

#[test]
fn test_loader_batches_drive_model() {
    let external = Tensor::rand(0f32, 1f32, (30, 4), &Device::Cpu).unwrap();
    let sampler = TemporalSampler::new(3, 2, 1).with_intervals(4, 12);
    let dataset = MdlDataset::from_od(&od_series(30), GRID, Some(external), sampler).unwrap();
    assert_eq!(dataset.len(), 30 - 12);

    let mut config = dataset.model_config().with_bridge(Bridge::Sum);
    config.embed_dim = 4;
    config.nb_residual_unit = 1;
    assert_eq!(config.external_dim, Some(4));
    let (model, _varmap) = MdlModel::with_varmap(config, &Device::Cpu).unwrap();

    let x_scaler = MinMaxScaler::fit(dataset.node_series()).unwrap();
    let m_scaler = MinMaxScaler::fit(dataset.edge_series()).unwrap();

    let mut loader = MdlDataLoader::new(dataset, 8, 3).unwrap();
    loader.shuffle_epoch();
    let mut batches = 0;
    while let Some(mut batch) = loader.next_batch().unwrap() {
        let n = batch.node_target.dims()[0];
        batch.node = scale_view(&batch.node, &x_scaler);
        batch.edge = scale_view(&batch.edge, &m_scaler);

        let out = model
            .multitask_loss(&batch, &x_scaler, &m_scaler, true)
            .unwrap();
        assert_eq!(out.node_pred.dims(), &[n, 2, 3, 3]);
        assert_eq!(out.edge_pred.dims(), &[n, 18, 3, 3]);
        assert!(out.components.total.is_finite());
        // targets come straight from the OD series, so they conserve flow
        assert_eq!(out.components.mdl, 0.0);
        batches += 1;
    }
    assert_eq!(batches, 3);
}

#[test]
fn test_zero_history_gives_zero_loss() {
    let od = Tensor::zeros((10, 9, 9), DType::F32, &Device::Cpu).unwrap();
    let sampler = TemporalSampler::new(2, 1, 1).with_intervals(2, 4);
    let dataset = MdlDataset::from_od(&od, GRID, None, sampler).unwrap();

    let mut config = dataset.model_config();
    config.embed_dim = 4;
    config.nb_residual_unit = 1;
    let (model, _varmap) = MdlModel::with_varmap(config, &Device::Cpu).unwrap();

    let mut loader = MdlDataLoader::new(dataset, 4, 0).unwrap();
    let batch = loader.next_batch().unwrap().unwrap();
    let out = model
        .multitask_loss(&batch, &IdentityScaler, &IdentityScaler, false)
        .unwrap();
    assert_eq!(out.components.total, 0.0);
}

fn scale_view(view: &ViewInput, scaler: &MinMaxScaler) -> ViewInput {
    ViewInput::new(
        scaler.transform(&view.closeness).unwrap(),
        scaler.transform(&view.period).unwrap(),
        scaler.transform(&view.trend).unwrap(),
    )
}
