use anyhow::Result;
use unitgraph::{Device, Parameter, Shape, UnitMetaData, UnitType};

use crate::common;

#[test]
fn metadata_round_trips_through_json() -> Result<()> {
    let mut manager = common::manager(Default::default());
    let x = common::constant(&mut manager, "x", 1, 4, vec![1.0, 2.0, 3.0, 4.0])?;
    let fc_id = manager.new_unit_id(UnitType::dense(), "fc");
    let meta = UnitMetaData::dense(fc_id, &x, common::shape(1, 4), 3, "XavierUniform", "Zeros")?
        .with_device(Device::CpuAvx2)
        .with_parameter("seed", Parameter::Int(7));

    let json = serde_json::to_string(&meta)?;
    let back: UnitMetaData = serde_json::from_str(&json)?;
    assert_eq!(back, meta);
    assert_eq!(back.output_shape, common::shape(1, 3));
    assert!(back.unit_id.unit_type.is_derived_from(&UnitType::hidden()));
    Ok(())
}

#[test]
fn zero_dims_are_rejected_when_deserializing() {
    let result: Result<Shape, _> = serde_json::from_str("[2, 0]");
    assert!(result.is_err());
    let ok: Shape = serde_json::from_str("[2, 3]").expect("valid shape");
    assert_eq!(ok.size(), 6);
}
