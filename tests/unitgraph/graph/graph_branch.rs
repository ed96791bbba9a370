use anyhow::Result;
use unitgraph::{EngineConfig, UnitMetaData, UnitType};

use crate::common;

/// x -> Dense(identity) -> {Identity -> MSE, Identity -> MSE}
#[test]
fn fan_out_sums_gradients() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 2, vec![1.0, -2.0])?;
    let zeros_a = common::constant(&mut manager, "za", 1, 2, vec![0.0, 0.0])?;
    let zeros_b = common::constant(&mut manager, "zb", 1, 2, vec![0.0, 0.0])?;
    let fc = common::dense(&mut manager, "fc", &x, 2, "Identity")?;
    let left = common::activation(&mut manager, "left", &fc, "Identity")?;
    let right = common::activation(&mut manager, "right", &fc, "Identity")?;
    common::loss(&mut manager, "loss_a", &left, &zeros_a, "MSE")?;
    common::loss(&mut manager, "loss_b", &right, &zeros_b, "MSE")?;
    manager.compile("SGD", &common::sgd(0.01))?;

    manager.forward(0)?;
    // Two readers: the producer keeps its buffer and each reader gets a copy.
    common::assert_close(&manager.unit_output(&fc)?.to_vec()?, &[1.0, -2.0])?;
    common::assert_close(&manager.unit_output(&left)?.to_vec()?, &[1.0, -2.0])?;
    common::assert_close(&manager.unit_output(&right)?.to_vec()?, &[1.0, -2.0])?;

    manager.backward(0)?;
    // Each branch contributes dL/dy = y; the dense input sees their sum.
    let grad = manager.unit_backward_output(&fc, &x)?;
    common::assert_close(&grad.to_vec()?, &[2.0, -4.0])?;
    Ok(())
}

#[test]
fn placeholder_reads_loader_per_cycle() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default().with_batch_size(2));
    let id = manager.new_unit_id(UnitType::placeholder(), "feed");
    let feed = manager.append_unit(UnitMetaData::placeholder(id, common::shape(1, 2)))?;
    let act = common::activation(&mut manager, "relu", &feed, "ReLU")?;
    manager.register_loader(&feed, |cycle, batch| {
        Ok((0..2 * batch).map(|i| i as f64 - cycle as f64).collect())
    })?;
    manager.compile("SGD", &common::sgd(0.1))?;

    manager.forward(0)?;
    common::assert_close(&manager.unit_output(&act)?.to_vec()?, &[0.0, 1.0, 2.0, 3.0])?;
    manager.async_forward(1)?;
    common::assert_close(&manager.unit_output(&act)?.to_vec()?, &[0.0, 0.0, 1.0, 2.0])?;
    Ok(())
}

#[test]
fn independent_branches_run_concurrently() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default().with_worker_threads(4));
    let mut sinks = Vec::new();
    for branch in 0..6 {
        let x = common::constant(&mut manager, &format!("x{}", branch), 1, 3, vec![branch as f64; 3])?;
        sinks.push(common::activation(&mut manager, &format!("tanh{}", branch), &x, "Tanh")?);
    }
    manager.compile("SGD", &common::sgd(0.1))?;
    let report = manager.async_forward(0)?;
    assert_eq!(report.executed, 12);
    // Sources, copies, then sinks: one wave each.
    assert_eq!(report.polls, 3);
    for (branch, sink) in sinks.iter().enumerate() {
        let expected = (branch as f64).tanh();
        common::assert_close(&manager.unit_output(sink)?.to_vec()?, &[expected; 3])?;
    }
    Ok(())
}
