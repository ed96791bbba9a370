//! Fully connected layer `y = x·W + b`.
//!
//! Samples are stacked row-wise, so a batch of `B` samples with `r` rows each
//! is one `(B·r)×in` matrix. Gradients are averaged over the batch before the
//! optimizer step.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ops;
use crate::strategy::Optimizer;
use crate::tensor::{Scalar, Tensor};

use super::computable::{Compute, UnitTensors};
use super::id::UnitId;
use super::metadata::{UnitMetaData, BIAS, INPUT, WEIGHT};

pub struct DenseUnit<T: Scalar> {
    input: UnitId,
    in_features: usize,
    out_features: usize,
    optimizer: Box<dyn Optimizer<T>>,
}

impl<T: Scalar> DenseUnit<T> {
    pub fn build(meta: &UnitMetaData, optimizer: Box<dyn Optimizer<T>>) -> Result<Self> {
        let input = meta.input_unit(INPUT)?.clone();
        let input_shape = meta.input_shape(INPUT)?;
        let weight = meta.internal_shape(WEIGHT)?;
        let bias = meta.internal_shape(BIAS)?;
        if weight.num_row() != input_shape.num_col() {
            return Err(Error::shape(
                format!("dense {} weight rows", meta.unit_id),
                input_shape,
                weight,
            ));
        }
        if bias.size() != weight.num_col() || meta.output_shape.num_col() != weight.num_col() {
            return Err(Error::shape(format!("dense {} bias", meta.unit_id), weight, bias));
        }
        let input_rows = input_shape.size() / weight.num_row();
        let output_rows = meta.output_shape.size() / weight.num_col();
        if input_rows != output_rows {
            return Err(Error::values(
                format!("dense {} output rows", meta.unit_id),
                input_rows,
                output_rows,
            ));
        }
        Ok(Self {
            input,
            in_features: weight.num_row(),
            out_features: weight.num_col(),
            optimizer,
        })
    }

    fn rows(&self, input_len: usize) -> usize {
        input_len / self.in_features
    }
}

impl<T: Scalar> Compute<T> for DenseUnit<T> {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let UnitTensors {
            forward_inputs,
            forward_output,
            internal,
            ..
        } = tensors;
        let x = forward_inputs
            .get(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data()?;
        let w = tensor(internal, WEIGHT)?.data()?;
        let b = tensor(internal, BIAS)?.data()?;
        let m = self.rows(x.len());
        let y = forward_output.data_mut()?;
        ops::matmul(x, w, y, m, self.in_features, self.out_features)?;
        for row in y.chunks_mut(self.out_features) {
            ops::add_assign(row, b)?;
        }
        Ok(())
    }

    fn backward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let grad = tensors.gathered_gradient()?;
        let batch = T::from_f64(tensors.forward_output.batch_size() as f64);
        let UnitTensors {
            forward_inputs,
            backward_outputs,
            internal,
            ..
        } = tensors;
        let x = forward_inputs
            .get(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data()?;
        let m = self.rows(x.len());
        let (n_in, n_out) = (self.in_features, self.out_features);

        // Input gradient uses the weights from before this step.
        let dx = backward_outputs
            .get_mut(&self.input)
            .ok_or_else(|| Error::UnknownUnit(self.input.clone()))?
            .data_mut()?;
        ops::matmul_a_bt(&grad, tensor(internal, WEIGHT)?.data()?, dx, m, n_out, n_in)?;

        let mut dw = vec![T::zero(); n_in * n_out];
        ops::matmul_at_b(x, &grad, &mut dw, m, n_in, n_out)?;
        ops::scale(&mut dw, T::one() / batch);
        let mut db = vec![T::zero(); n_out];
        ops::sum_rows(&grad, &mut db, m, n_out)?;
        ops::scale(&mut db, T::one() / batch);

        let weight = tensor_mut(internal, WEIGHT)?.data_mut()?;
        self.optimizer.step(WEIGHT, weight, &dw)?;
        let bias = tensor_mut(internal, BIAS)?.data_mut()?;
        self.optimizer.step(BIAS, bias, &db)?;
        Ok(())
    }
}

fn tensor<'a, T: Scalar>(
    internal: &'a HashMap<String, Tensor<T>>,
    name: &str,
) -> Result<&'a Tensor<T>> {
    internal.get(name).ok_or_else(|| missing(name))
}

fn tensor_mut<'a, T: Scalar>(
    internal: &'a mut HashMap<String, Tensor<T>>,
    name: &str,
) -> Result<&'a mut Tensor<T>> {
    internal.get_mut(name).ok_or_else(|| missing(name))
}

fn missing(name: &str) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        reason: "dense internal variable was not allocated".to_string(),
    }
}
