use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tensor::Scalar;

use super::computable::{Compute, UnitTensors};

/// Supplies one cycle's worth of data: `(cycle, batch_size) -> values`.
pub type DataLoader<T> = Arc<dyn Fn(usize, usize) -> anyhow::Result<Vec<T>> + Send + Sync>;

/// Source fed by an external data loader.
pub struct PlaceHolderUnit<T> {
    loader: DataLoader<T>,
}

impl<T: Scalar> PlaceHolderUnit<T> {
    pub fn new(loader: DataLoader<T>) -> Self {
        Self { loader }
    }
}

impl<T: Scalar> Compute<T> for PlaceHolderUnit<T> {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, cycle: usize) -> Result<()> {
        let output = &mut tensors.forward_output;
        let data = (self.loader)(cycle, output.batch_size())?;
        if data.len() != output.len() {
            return Err(Error::values(
                format!("placeholder data for {}", output.shape()),
                output.len(),
                data.len(),
            ));
        }
        output.data_mut()?.copy_from_slice(&data);
        Ok(())
    }

    fn backward(&mut self, _tensors: &mut UnitTensors<T>, _cycle: usize) -> Result<()> {
        Ok(())
    }
}
