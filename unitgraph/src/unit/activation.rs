use std::sync::Arc;

use crate::error::{Error, Result};
use crate::strategy::{Activation, StrategyRegistry};
use crate::tensor::{Scalar, Shape};

use super::computable::{Compute, UnitTensors};
use super::id::UnitId;
use super::metadata::{UnitMetaData, INPUT};

/// Applies a registered activation to every sample of its single input.
pub struct ActivationUnit<T: Scalar> {
    input: UnitId,
    shape: Shape,
    activation: Arc<dyn Activation<T>>,
}

impl<T: Scalar> ActivationUnit<T> {
    pub fn build(meta: &UnitMetaData, registry: &StrategyRegistry<T>) -> Result<Self> {
        let input = meta.input_unit(INPUT)?.clone();
        let shape = meta.input_shape(INPUT)?.clone();
        if shape != meta.output_shape {
            return Err(Error::shape(
                format!("activation {}", meta.unit_id),
                &shape,
                &meta.output_shape,
            ));
        }
        let activation = registry.activation(meta.strategy_name("activation")?)?;
        Ok(Self {
            input,
            shape,
            activation,
        })
    }
}

impl<T: Scalar> Compute<T> for ActivationUnit<T> {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let x = tensors
            .forward_inputs
            .get(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data()?;
        let y = tensors.forward_output.data_mut()?;
        let size = self.shape.size();
        for (xs, ys) in x.chunks(size).zip(y.chunks_mut(size)) {
            self.activation.apply(xs, ys, &self.shape)?;
        }
        Ok(())
    }

    fn backward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let grad = tensors.gathered_gradient()?;
        let x = tensors
            .forward_inputs
            .get(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data()?;
        // The forward output may already have been handed to a consumer.
        let mut y = vec![T::zero(); x.len()];
        let size = self.shape.size();
        for (xs, ys) in x.chunks(size).zip(y.chunks_mut(size)) {
            self.activation.apply(xs, ys, &self.shape)?;
        }
        let dx = tensors
            .backward_outputs
            .get_mut(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data_mut()?;
        for (((xs, ys), gs), ds) in x
            .chunks(size)
            .zip(y.chunks(size))
            .zip(grad.chunks(size))
            .zip(dx.chunks_mut(size))
        {
            self.activation.derivative(xs, ys, gs, ds, &self.shape)?;
        }
        Ok(())
    }
}
