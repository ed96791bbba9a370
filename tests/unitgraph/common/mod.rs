#![allow(dead_code)]

use anyhow::{anyhow, Result};
use unitgraph::{
    EngineConfig, Parameters, Shape, StrategyRegistry, UnitId, UnitManager, UnitMetaData,
    UnitType,
};

#[derive(Clone, Copy)]
pub struct FloatTol {
    pub abs: f64,
    pub rel: f64,
}

impl Default for FloatTol {
    fn default() -> Self {
        Self { abs: 1e-9, rel: 1e-9 }
    }
}

pub fn assert_close(actual: &[f64], expected: &[f64]) -> Result<()> {
    assert_close_tol(actual, expected, FloatTol::default())
}

pub fn assert_close_tol(actual: &[f64], expected: &[f64], tol: FloatTol) -> Result<()> {
    if actual.len() != expected.len() {
        return Err(anyhow!(
            "length mismatch: actual {} expected {}",
            actual.len(),
            expected.len()
        ));
    }
    for (idx, (a, b)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - b).abs();
        if diff <= tol.abs {
            continue;
        }
        if diff > tol.rel * a.abs().max(b.abs()) {
            return Err(anyhow!(
                "value mismatch at {}: actual {} expected {} (diff {})",
                idx,
                a,
                b,
                diff
            ));
        }
    }
    Ok(())
}

pub fn shape(rows: usize, cols: usize) -> Shape {
    Shape::matrix(rows, cols).expect("valid test shape")
}

pub fn manager(config: EngineConfig) -> UnitManager<f64> {
    UnitManager::new(config, StrategyRegistry::with_defaults())
}

pub fn sgd(lr: f64) -> Parameters {
    Parameters::new().with_float("learning_rate", lr)
}

pub fn constant(manager: &mut UnitManager<f64>, name: &str, rows: usize, cols: usize, data: Vec<f64>) -> Result<UnitId> {
    let id = manager.new_unit_id(UnitType::constant(), name);
    Ok(manager.append_unit(UnitMetaData::constant(id, shape(rows, cols), data))?)
}

pub fn dense(
    manager: &mut UnitManager<f64>,
    name: &str,
    input: &UnitId,
    units: usize,
    weight_init: &str,
) -> Result<UnitId> {
    let id = manager.new_unit_id(UnitType::dense(), name);
    let input_shape = manager.get_unit_output_shape(input)?;
    let meta = UnitMetaData::dense(id, input, input_shape, units, weight_init, "Zeros")?;
    Ok(manager.append_unit(meta)?)
}

pub fn activation(manager: &mut UnitManager<f64>, name: &str, input: &UnitId, kind: &str) -> Result<UnitId> {
    let id = manager.new_unit_id(UnitType::activation(), name);
    let input_shape = manager.get_unit_output_shape(input)?;
    Ok(manager.append_unit(UnitMetaData::activation(id, input, input_shape, kind))?)
}

pub fn loss(
    manager: &mut UnitManager<f64>,
    name: &str,
    prediction: &UnitId,
    label: &UnitId,
    kind: &str,
) -> Result<UnitId> {
    let id = manager.new_unit_id(UnitType::loss(), name);
    let pred_shape = manager.get_unit_output_shape(prediction)?;
    Ok(manager.append_unit(UnitMetaData::loss(id, prediction, label, pred_shape, kind)?)?)
}

/// Source {1,4} -> Dense(2, identity weights) -> ReLU -> MSE against zeros.
pub struct Scenario {
    pub manager: UnitManager<f64>,
    pub source: UnitId,
    pub label: UnitId,
    pub dense: UnitId,
    pub relu: UnitId,
    pub loss: UnitId,
}

pub fn dense_relu_mse(config: EngineConfig) -> Result<Scenario> {
    let mut manager = manager(config);
    let source = constant(&mut manager, "x", 1, 4, vec![1.0, 2.0, 3.0, 4.0])?;
    let label = constant(&mut manager, "y", 1, 2, vec![0.0, 0.0])?;
    let dense = dense(&mut manager, "fc", &source, 2, "Identity")?;
    let relu = activation(&mut manager, "relu", &dense, "ReLU")?;
    let loss = loss(&mut manager, "mse", &relu, &label, "MSE")?;
    manager.compile("SGD", &sgd(0.01))?;
    Ok(Scenario {
        manager,
        source,
        label,
        dense,
        relu,
        loss,
    })
}
