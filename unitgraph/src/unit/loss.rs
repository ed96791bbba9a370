use std::sync::Arc;

use crate::error::{Error, Result};
use crate::strategy::{Loss, StrategyRegistry};
use crate::tensor::Scalar;

use super::computable::{Compute, UnitTensors};
use super::id::UnitId;
use super::metadata::{UnitMetaData, LABEL, PREDICTION};

/// Sink producing one loss value per sample.
///
/// Backward writes the loss gradient toward the prediction and zeros toward
/// the label. When the loss itself has consumers their gradient scales the
/// per-sample result; otherwise the seed gradient is one.
pub struct LossUnit<T: Scalar> {
    prediction: UnitId,
    label: UnitId,
    loss: Arc<dyn Loss<T>>,
}

impl<T: Scalar> LossUnit<T> {
    pub fn build(meta: &UnitMetaData, registry: &StrategyRegistry<T>) -> Result<Self> {
        let prediction = meta.input_unit(PREDICTION)?.clone();
        let label = meta.input_unit(LABEL)?.clone();
        let pred_shape = meta.input_shape(PREDICTION)?;
        let label_shape = meta.input_shape(LABEL)?;
        if pred_shape.size() != label_shape.size() {
            return Err(Error::shape(
                format!("loss {} label", meta.unit_id),
                pred_shape,
                label_shape,
            ));
        }
        if meta.output_shape.size() != 1 {
            return Err(Error::values(
                format!("loss {} output", meta.unit_id),
                1,
                meta.output_shape.size(),
            ));
        }
        let loss = registry.loss(meta.strategy_name("loss")?)?;
        Ok(Self {
            prediction,
            label,
            loss,
        })
    }
}

impl<T: Scalar> Compute<T> for LossUnit<T> {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let pred = tensors.forward_input(&self.prediction)?;
        let label = tensors.forward_input(&self.label)?;
        let size = pred.shape().size();
        let mut values = Vec::with_capacity(pred.batch_size());
        for (p, l) in pred.data()?.chunks(size).zip(label.data()?.chunks(size)) {
            values.push(self.loss.apply(p, l)?);
        }
        tensors.forward_output.data_mut()?.copy_from_slice(&values);
        Ok(())
    }

    fn backward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let seed = if tensors.backward_inputs.is_empty() {
            vec![T::one(); tensors.forward_output.len()]
        } else {
            tensors.gathered_gradient()?
        };
        let UnitTensors {
            forward_inputs,
            backward_outputs,
            ..
        } = tensors;
        let pred = forward_inputs
            .get(&self.prediction)
            .ok_or_else(|| Error::UnknownUnit(self.prediction.clone()))?;
        let label = forward_inputs
            .get(&self.label)
            .ok_or_else(|| Error::UnknownUnit(self.label.clone()))?;
        let size = pred.shape().size();
        let grad = backward_outputs
            .get_mut(&self.prediction)
            .ok_or_else(|| Error::UnknownUnit(self.prediction.clone()))?
            .data_mut()?;
        for (((p, l), g), s) in pred
            .data()?
            .chunks(size)
            .zip(label.data()?.chunks(size))
            .zip(grad.chunks_mut(size))
            .zip(&seed)
        {
            self.loss.derivative(p, l, g)?;
            g.iter_mut().for_each(|x| *x = *x * *s);
        }
        backward_outputs
            .get_mut(&self.label)
            .ok_or_else(|| Error::UnknownUnit(self.label.clone()))?
            .fill(T::zero())
    }
}
