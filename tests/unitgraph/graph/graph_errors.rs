use std::thread;
use std::time::Duration;

use anyhow::Result;
use unitgraph::{EngineConfig, Error, Parameters, UnitMetaData, UnitType};

use crate::common;

#[test]
fn dangling_reference_fails_compile() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let ghost = manager.new_unit_id(UnitType::constant(), "never_appended");
    let fc_id = manager.new_unit_id(UnitType::dense(), "fc");
    let meta = UnitMetaData::dense(fc_id.clone(), &ghost, common::shape(1, 4), 2, "Zeros", "Zeros")?;
    manager.append_unit(meta)?;

    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    match err {
        Error::DanglingReference { unit, missing, .. } => {
            assert_eq!(unit, fc_id);
            assert_eq!(missing, ghost);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!manager.is_compiled());
    assert_eq!(manager.copy_unit_count(), 0);
    assert!(matches!(manager.forward(0), Err(Error::NotCompiled)));
    Ok(())
}

#[test]
fn unknown_loss_fails_compile() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 2, vec![0.5, 0.5])?;
    let y = common::constant(&mut manager, "y", 1, 2, vec![0.0, 1.0])?;
    common::loss(&mut manager, "hinge", &x, &y, "Hinge")?;
    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    assert!(matches!(err, Error::UnknownStrategy { kind: "loss", ref name } if name == "Hinge"));
    Ok(())
}

#[test]
fn placeholder_without_loader_fails_compile() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let id = manager.new_unit_id(UnitType::placeholder(), "feed");
    let feed = manager.append_unit(UnitMetaData::placeholder(id, common::shape(1, 2)))?;
    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    assert!(matches!(err, Error::MissingLoader(ref unit) if *unit == feed));
    Ok(())
}

#[test]
fn same_unit_in_two_slots_is_rejected() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 2, vec![0.5, 0.5])?;
    common::loss(&mut manager, "self_loss", &x, &x, "MSE")?;
    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { .. }));
    Ok(())
}

#[test]
fn dense_weight_shape_is_checked() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 4, vec![0.0; 4])?;
    let fc_id = manager.new_unit_id(UnitType::dense(), "fc");
    let mut meta = UnitMetaData::dense(fc_id, &x, common::shape(1, 4), 2, "Zeros", "Zeros")?;
    meta.internal_variable_shapes
        .insert("weight".to_string(), common::shape(3, 2));
    manager.append_unit(meta)?;
    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert!(!manager.is_compiled());
    Ok(())
}

#[test]
fn dense_output_rows_are_checked() -> Result<()> {
    let mut manager = common::manager(EngineConfig::default());
    let x = common::constant(&mut manager, "x", 1, 4, vec![0.0; 4])?;
    let fc_id = manager.new_unit_id(UnitType::dense(), "fc");
    let mut meta = UnitMetaData::dense(fc_id, &x, common::shape(1, 4), 2, "Zeros", "Zeros")?;
    meta.output_shape = common::shape(3, 2);
    manager.append_unit(meta)?;
    let err = manager.compile("SGD", &Parameters::new()).unwrap_err();
    match err {
        Error::ShapeMismatch { context, .. } => assert!(context.contains("output rows")),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!manager.is_compiled());
    Ok(())
}

#[test]
fn out_of_order_cycle_stalls() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let err = scenario.manager.forward(1).unwrap_err();
    match err {
        Error::Stalled { cycle, pending } => {
            assert_eq!(cycle, 1);
            assert_eq!(pending.len(), 5 + 4);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(matches!(
        scenario.manager.async_forward(1),
        Err(Error::Stalled { cycle: 1, .. })
    ));
    Ok(())
}

#[test]
fn slow_cycle_hits_deadline() -> Result<()> {
    let config = EngineConfig::default().with_deadline(Duration::from_millis(5));
    let mut manager = common::manager(config);
    let id = manager.new_unit_id(UnitType::placeholder(), "slow");
    let feed = manager.append_unit(UnitMetaData::placeholder(id, common::shape(1, 1)))?;
    let relu = common::activation(&mut manager, "relu", &feed, "ReLU")?;
    manager.register_loader(&feed, |_, batch| {
        thread::sleep(Duration::from_millis(30));
        Ok(vec![1.0; batch])
    })?;
    manager.compile("SGD", &Parameters::new())?;
    assert!(matches!(manager.forward(0), Err(Error::DeadlineExceeded { cycle: 0 })));
    // The slow unit finished; nothing after it was started.
    assert_eq!(manager.unit_state(&feed)?.forward, 1);
    assert_eq!(manager.unit_state(&relu)?.forward, 0);
    Ok(())
}

#[test]
fn finished_cycle_ignores_elapsed_deadline() -> Result<()> {
    let config = EngineConfig::default().with_deadline(Duration::from_millis(5));
    let mut manager = common::manager(config);
    let id = manager.new_unit_id(UnitType::placeholder(), "slow");
    let feed = manager.append_unit(UnitMetaData::placeholder(id, common::shape(1, 1)))?;
    manager.register_loader(&feed, |_, batch| {
        thread::sleep(Duration::from_millis(30));
        Ok(vec![1.0; batch])
    })?;
    manager.compile("SGD", &Parameters::new())?;
    let report = manager.forward(0)?;
    assert_eq!(report.executed, 1);
    assert_eq!(report.polls, 1);
    let report = manager.async_forward(1)?;
    assert_eq!(report.executed, 1);
    assert_eq!(manager.unit_state(&feed)?.forward, 2);
    Ok(())
}

#[test]
fn lookups_of_unknown_units_fail() -> Result<()> {
    let scenario = common::dense_relu_mse(EngineConfig::default())?;
    let mut other = common::manager(EngineConfig::default());
    let stranger = other.new_unit_id(UnitType::constant(), "stranger");
    assert!(matches!(
        scenario.manager.get_unit_output_shape(&stranger),
        Err(Error::UnknownUnit(_))
    ));
    assert!(matches!(
        scenario.manager.unit_state(&stranger),
        Err(Error::UnknownUnit(_))
    ));
    Ok(())
}

#[test]
fn compiled_graph_is_frozen() -> Result<()> {
    let mut scenario = common::dense_relu_mse(EngineConfig::default())?;
    let extra = scenario.manager.new_unit_id(UnitType::constant(), "late");
    let meta = UnitMetaData::constant(extra, common::shape(1, 1), vec![1.0]);
    assert!(matches!(scenario.manager.append_unit(meta), Err(Error::AlreadyCompiled)));
    assert!(matches!(
        scenario.manager.compile("SGD", &Parameters::new()),
        Err(Error::AlreadyCompiled)
    ));
    Ok(())
}
