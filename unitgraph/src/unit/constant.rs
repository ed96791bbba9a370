use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::tensor::Scalar;

use super::computable::{Compute, UnitTensors};
use super::metadata::UnitMetaData;

/// Source emitting the same data every cycle.
///
/// The data covers either one sample (replicated across the batch) or the
/// whole batch.
pub struct ConstantUnit<T> {
    data: Vec<f64>,
    _marker: PhantomData<T>,
}

impl<T: Scalar> ConstantUnit<T> {
    pub fn build(meta: &UnitMetaData) -> Result<Self> {
        let data = meta
            .parameters
            .floats("data")?
            .map(|values| values.to_vec())
            .unwrap_or_else(|| vec![0.0; meta.output_shape.size()]);
        let size = meta.output_shape.size();
        if data.is_empty() || data.len() % size != 0 {
            return Err(Error::values(
                format!("constant {}", meta.unit_id),
                size,
                data.len(),
            ));
        }
        Ok(Self {
            data,
            _marker: PhantomData,
        })
    }
}

impl<T: Scalar> Compute<T> for ConstantUnit<T> {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        let output = &mut tensors.forward_output;
        let size = output.shape().size();
        let batch = output.batch_size();
        let out = output.data_mut()?;
        if self.data.len() == size {
            for sample in out.chunks_mut(size) {
                for (dst, src) in sample.iter_mut().zip(&self.data) {
                    *dst = T::from_f64(*src);
                }
            }
        } else if self.data.len() == size * batch {
            for (dst, src) in out.iter_mut().zip(&self.data) {
                *dst = T::from_f64(*src);
            }
        } else {
            return Err(Error::values("constant batch", size * batch, self.data.len()));
        }
        Ok(())
    }

    fn backward(&mut self, _tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        Ok(())
    }
}
