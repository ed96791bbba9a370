use anyhow::Result;
use unitgraph::{copy_tensor_data, forward_tensor_data, Device, Error, Tensor};

use crate::common;

#[test]
fn forwarding_leaves_exactly_one_owner() -> Result<()> {
    let mut src = Tensor::from_vec(common::shape(1, 3), 1, Device::Cpu, vec![1.0f64, 2.0, 3.0])?;
    let mut dst = Tensor::new(common::shape(1, 3), 1, Device::Cpu);
    forward_tensor_data(&mut src, &mut dst)?;

    assert!(!src.is_owned());
    assert!(dst.is_owned());
    assert!(matches!(src.data(), Err(Error::OwnershipViolation(_))));
    assert!(matches!(src.at(0, 0), Err(Error::OwnershipViolation(_))));
    assert_eq!(dst.to_vec()?, vec![1.0, 2.0, 3.0]);

    // A second forward from the emptied source must fail, not duplicate.
    let mut other = Tensor::<f64>::new(common::shape(1, 3), 1, Device::Cpu);
    assert!(matches!(
        forward_tensor_data(&mut src, &mut other),
        Err(Error::OwnershipViolation(_))
    ));
    Ok(())
}

#[test]
fn forwarded_tensor_can_be_reallocated() -> Result<()> {
    let mut src = Tensor::from_vec(common::shape(1, 2), 1, Device::Cpu, vec![5.0f64, 6.0])?;
    let mut dst = Tensor::new(common::shape(1, 2), 1, Device::Cpu);
    forward_tensor_data(&mut src, &mut dst)?;
    src.ensure_owned();
    assert_eq!(src.to_vec()?, vec![0.0, 0.0]);
    assert_eq!(dst.to_vec()?, vec![5.0, 6.0]);
    Ok(())
}

#[test]
fn copy_round_trip() -> Result<()> {
    let a = Tensor::from_vec(common::shape(2, 2), 2, Device::Cpu, (0..8).map(f64::from).collect())?;
    let mut b = Tensor::new(common::shape(2, 2), 2, Device::Cpu);
    let mut c = Tensor::new(common::shape(2, 2), 2, Device::Cpu);
    copy_tensor_data(&a, &mut b)?;
    copy_tensor_data(&b, &mut c)?;
    assert_eq!(c.to_vec()?, a.to_vec()?);
    assert!(a.is_owned() && b.is_owned());
    Ok(())
}

#[test]
fn copy_rejects_mismatched_layout() -> Result<()> {
    let a = Tensor::<f32>::new(common::shape(1, 4), 1, Device::Cpu);
    let mut wrong_shape = Tensor::new(common::shape(2, 2), 1, Device::Cpu);
    let mut wrong_device = Tensor::new(common::shape(1, 4), 1, Device::CpuAvx);
    assert!(matches!(
        copy_tensor_data(&a, &mut wrong_shape),
        Err(Error::ShapeMismatch { .. })
    ));
    assert!(matches!(
        copy_tensor_data(&a, &mut wrong_device),
        Err(Error::DeviceMismatch { .. })
    ));
    Ok(())
}

#[test]
fn initial_data_must_cover_the_batch() {
    let result = Tensor::from_vec(common::shape(1, 2), 2, Device::Cpu, vec![1.0f64, 2.0]);
    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
}
