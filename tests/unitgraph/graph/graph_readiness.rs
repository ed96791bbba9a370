use anyhow::Result;
use unitgraph::{Direction, EngineConfig, StateSnapshot, WEIGHT};

use crate::common;

#[test]
fn readiness_is_monotonic() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let manager = &scenario.manager;

    assert!(manager.is_ready(&scenario.source, Direction::Forward, 0)?);
    assert!(!manager.is_ready(&scenario.dense, Direction::Forward, 0)?);

    manager.forward(0)?;
    for unit in [&scenario.source, &scenario.dense, &scenario.relu, &scenario.loss] {
        assert!(!manager.is_ready(unit, Direction::Forward, 0)?);
    }
    // Sources may run ahead; everything downstream waits for them.
    assert!(manager.is_ready(&scenario.source, Direction::Forward, 1)?);
    assert!(!manager.is_ready(&scenario.dense, Direction::Forward, 1)?);

    assert!(manager.is_ready(&scenario.loss, Direction::Backward, 0)?);
    assert!(!manager.is_ready(&scenario.dense, Direction::Backward, 0)?);
    assert!(!manager.is_ready(&scenario.source, Direction::Backward, 0)?);
    Ok(())
}

#[test]
fn each_unit_updates_exactly_once_per_cycle() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let manager = &scenario.manager;
    for cycle in 0..3 {
        let report = manager.forward(cycle)?;
        assert_eq!(report.executed, manager.unit_ids().len());
        manager.backward(cycle)?;
        for unit in manager.unit_ids() {
            assert_eq!(manager.unit_state(&unit)?.forward, cycle + 1, "unit {}", unit);
        }
        for unit in [&scenario.dense, &scenario.relu, &scenario.loss] {
            assert_eq!(manager.unit_state(unit)?.backward, cycle + 1);
        }
        // Sources take no part in backward.
        assert_eq!(manager.unit_state(&scenario.source)?.backward, 0);
    }
    Ok(())
}

#[test]
fn reset_allows_restarting_at_cycle_zero() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let manager = &scenario.manager;
    manager.forward(0)?;
    manager.forward(1)?;
    manager.reset()?;
    assert_eq!(
        manager.unit_state(&scenario.dense)?,
        StateSnapshot {
            forward: 0,
            backward: 0
        }
    );
    let report = manager.forward(0)?;
    assert_eq!(report.executed, 5);
    Ok(())
}

#[test]
fn batch_size_change_keeps_weights() -> Result<()> {
    let mut scenario = common::dense_relu_mse(EngineConfig::default())?;
    scenario.manager.forward(0)?;
    scenario.manager.backward(0)?;
    let weight = scenario.manager.internal_tensor(&scenario.dense, WEIGHT)?.to_vec()?;

    scenario.manager.change_batch_size(3)?;
    assert_eq!(scenario.manager.config().batch_size, 3);
    assert_eq!(scenario.manager.unit_state(&scenario.dense)?.forward, 0);
    scenario.manager.forward(0)?;

    let loss = scenario.manager.unit_output(&scenario.loss)?;
    assert_eq!(loss.batch_size(), 3);
    let values = loss.to_vec()?;
    assert!(values.iter().all(|v| (v - values[0]).abs() < 1e-12));
    assert_eq!(
        scenario.manager.internal_tensor(&scenario.dense, WEIGHT)?.to_vec()?,
        weight
    );
    Ok(())
}
