use anyhow::Result;
use unitgraph::{EngineConfig, Parameters, UnitId, UnitManager};

use crate::common;

fn regression(optimizer: &str, params: &Parameters) -> Result<(UnitManager<f64>, UnitId)> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 4, vec![1.0, 2.0, 3.0, 4.0])?;
    let y = common::constant(&mut manager, "y", 1, 1, vec![3.0])?;
    let fc = common::dense(&mut manager, "fc", &x, 1, "Zeros")?;
    let loss = common::loss(&mut manager, "mse", &fc, &y, "MSE")?;
    manager.compile(optimizer, params)?;
    Ok((manager, loss))
}

fn train(manager: &UnitManager<f64>, loss: &UnitId, cycles: usize) -> Result<Vec<f64>> {
    let mut history = Vec::with_capacity(cycles);
    for cycle in 0..cycles {
        manager.forward(cycle)?;
        history.push(manager.unit_output(loss)?.at(0, 0)?);
        manager.backward(cycle)?;
    }
    Ok(history)
}

#[test]
fn sgd_converges_on_linear_target() -> Result<()> {
    let (manager, loss) = regression("SGD", &common::sgd(0.01))?;
    let history = train(&manager, &loss, 60)?;
    assert!((history[0] - 9.0).abs() < 1e-12);
    let last = history[history.len() - 1];
    assert!(last < 1e-6, "loss did not converge: {}", last);
    Ok(())
}

#[test]
fn momentum_and_adam_reduce_loss() -> Result<()> {
    for (name, params) in [
        ("Momentum", Parameters::new().with_float("learning_rate", 0.005)),
        ("Adam", Parameters::new().with_float("learning_rate", 0.05)),
    ] {
        let (manager, loss) = regression(name, &params)?;
        let history = train(&manager, &loss, 100)?;
        assert!(
            history[history.len() - 1] < history[0] * 0.1,
            "{} stalled: {:?}",
            name,
            &history[history.len() - 5..]
        );
    }
    Ok(())
}

#[test]
fn async_training_matches_sync_training() -> Result<()> {
    let (sync, sync_loss) = regression("SGD", &common::sgd(0.01))?;
    let (threaded, threaded_loss) = regression("SGD", &common::sgd(0.01))?;
    let expected = train(&sync, &sync_loss, 10)?;
    for (cycle, want) in expected.iter().enumerate() {
        threaded.async_forward(cycle)?;
        let got = threaded.unit_output(&threaded_loss)?.at(0, 0)?;
        common::assert_close(&[got], &[*want])?;
        threaded.async_backward(cycle)?;
    }
    Ok(())
}
