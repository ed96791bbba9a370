use anyhow::Result;
use unitgraph::{EngineConfig, WEIGHT};

use crate::common;

#[test]
fn dense_relu_mse_forward_loss() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let report = scenario.manager.forward(0)?;
    assert_eq!(report.executed, 5);
    assert_eq!(report.copies, 4);

    // x·W = [1, 2]; relu keeps both; mse against zeros = (1 + 4) / 2.
    let loss = scenario.manager.unit_output(&scenario.loss)?;
    common::assert_close(&loss.to_vec()?, &[2.5])?;
    assert_eq!(loss.shape(), &common::shape(1, 1));

    let hidden = scenario.manager.unit_output(&scenario.dense)?;
    common::assert_close(&hidden.to_vec()?, &[1.0, 2.0])?;
    Ok(())
}

#[test]
fn dense_relu_mse_backward_gradient() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let weight_before = scenario.manager.internal_tensor(&scenario.dense, WEIGHT)?.to_vec()?;
    scenario.manager.forward(0)?;
    let report = scenario.manager.backward(0)?;
    assert_eq!(report.executed, 3);
    assert_eq!(report.copies, 4);

    let grad = scenario
        .manager
        .unit_backward_output(&scenario.dense, &scenario.source)?;
    assert_eq!(grad.shape(), &scenario.manager.get_unit_output_shape(&scenario.source)?);
    // dL/dy = [1, 2], routed back through the identity-like weights.
    common::assert_close(&grad.to_vec()?, &[1.0, 2.0, 0.0, 0.0])?;

    let label_grad = scenario
        .manager
        .unit_backward_output(&scenario.loss, &scenario.label)?;
    common::assert_close(&label_grad.to_vec()?, &[0.0, 0.0])?;

    let weight_after = scenario.manager.internal_tensor(&scenario.dense, WEIGHT)?.to_vec()?;
    assert_ne!(weight_before, weight_after);
    Ok(())
}

#[test]
fn copy_units_cover_every_edge() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    assert_eq!(scenario.manager.copy_unit_count(), 4);
    assert_eq!(scenario.manager.unit_ids().len(), 5);
    let meta = scenario.manager.metadata(&scenario.dense)?;
    assert_eq!(meta.output_units, vec![scenario.relu.clone()]);
    Ok(())
}
