use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use unitgraph::{Direction, EngineConfig, Error, UnitMetaData, UnitType, WEIGHT};

use crate::common;

#[test]
fn async_matches_sync() -> Result<()> {
    let sync = common::dense_relu_mse(EngineConfig::default())?;
    let threaded = common::dense_relu_mse(EngineConfig::default().with_worker_threads(4))?;
    for cycle in 0..5 {
        sync.manager.forward(cycle)?;
        let report = threaded.manager.async_forward(cycle)?;
        assert_eq!(report.executed, 5);
        assert_eq!(report.copies, 4);
        common::assert_close(
            &threaded.manager.unit_output(&threaded.loss)?.to_vec()?,
            &sync.manager.unit_output(&sync.loss)?.to_vec()?,
        )?;

        sync.manager.backward(cycle)?;
        let report = threaded.manager.async_backward(cycle)?;
        assert_eq!(report.executed, 3);
        common::assert_close(
            &threaded.manager.internal_tensor(&threaded.dense, WEIGHT)?.to_vec()?,
            &sync.manager.internal_tensor(&sync.dense, WEIGHT)?.to_vec()?,
        )?;
    }
    Ok(())
}

#[test]
fn cancelled_cycle_dispatches_nothing() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default().with_worker_threads(2))?;
    let token = scenario.manager.cancel_token();
    token.cancel();
    let err = scenario.manager.async_forward(0).unwrap_err();
    assert!(matches!(err, Error::Cancelled { cycle: 0 }));
    assert!(matches!(scenario.manager.forward(0), Err(Error::Cancelled { cycle: 0 })));
    assert_eq!(scenario.manager.unit_state(&scenario.source)?.forward, 0);

    token.clear();
    scenario.manager.async_forward(0)?;
    assert_eq!(scenario.manager.unit_state(&scenario.loss)?.forward, 1);
    Ok(())
}

#[test]
fn cancel_during_cycle_drains_running_tasks() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default().with_worker_threads(2));
    let id = manager.new_unit_id(UnitType::placeholder(), "feed");
    let feed = manager.append_unit(UnitMetaData::placeholder(id, common::shape(1, 2)))?;
    let relu = common::activation(&mut manager, "relu", &feed, "ReLU")?;
    let token = manager.cancel_token();
    let finished = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&finished);
    manager.register_loader(&feed, move |_, batch| {
        token.cancel();
        thread::sleep(Duration::from_millis(20));
        done.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0; 2 * batch])
    })?;
    manager.compile("SGD", &common::sgd(0.1))?;

    let err = manager.async_forward(0).unwrap_err();
    assert!(matches!(err, Error::Cancelled { cycle: 0 }));
    // The in-flight loader ran to completion and published its state.
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(manager.unit_state(&feed)?.forward, 1);
    // Nothing was dispatched after the cancel.
    assert_eq!(manager.unit_state(&relu)?.forward, 0);
    assert!(!manager.is_ready(&relu, Direction::Forward, 0)?);
    Ok(())
}

#[test]
fn loader_failure_surfaces_after_draining() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default().with_worker_threads(4));
    let good_id = manager.new_unit_id(UnitType::placeholder(), "good");
    let good = manager.append_unit(UnitMetaData::placeholder(good_id, common::shape(1, 2)))?;
    let bad_id = manager.new_unit_id(UnitType::placeholder(), "bad");
    let bad = manager.append_unit(UnitMetaData::placeholder(bad_id, common::shape(1, 2)))?;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    manager.register_loader(&good, move |_, batch| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0; 2 * batch])
    })?;
    manager.register_loader(&bad, |cycle, _| Err(anyhow!("no data for cycle {}", cycle)))?;
    manager.compile("SGD", &common::sgd(0.1))?;

    let err = manager.async_forward(0).unwrap_err();
    assert!(matches!(err, Error::External(_)));
    assert!(err.to_string().contains("no data for cycle 0"));
    // The healthy task still ran to completion before the error was reported.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.unit_state(&good)?.forward, 1);
    assert_eq!(manager.unit_state(&bad)?.forward, 0);
    Ok(())
}
