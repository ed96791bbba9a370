//! Shaped, device-tagged tensor with a version counter.
//!
//! `Tensor<T>` holds its storage in a move-only [`TensorBuffer`]. The buffer
//! can be forwarded to another tensor on the same device, after which the
//! source holds nothing and every data access on it fails with
//! `OwnershipViolation` until it is reallocated by its owning unit.
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

use super::device::Device;
use super::scalar::Scalar;
use super::shape::Shape;

/// Exclusively owned element storage. Deliberately not `Clone`.
pub struct TensorBuffer<T> {
    data: Vec<T>,
}

impl<T: Scalar> TensorBuffer<T> {
    fn zeroed(len: usize) -> Self {
        Self {
            data: vec![T::zero(); len],
        }
    }
}

/// Owned tensor with shape, batch size, device tag and `State` counter.
pub struct Tensor<T> {
    buffer: Option<TensorBuffer<T>>,
    shape: Shape,
    device: Device,
    batch_size: usize,
    state: AtomicUsize,
}

impl<T: Scalar> Tensor<T> {
    /// Allocate a zero-filled tensor.
    pub fn new(shape: Shape, batch_size: usize, device: Device) -> Self {
        let len = Self::buffer_len(&shape, batch_size, device);
        Self {
            buffer: Some(TensorBuffer::zeroed(len)),
            shape,
            device,
            batch_size,
            state: AtomicUsize::new(0),
        }
    }

    /// Build a tensor from data covering every sample of the batch.
    pub fn from_vec(shape: Shape, batch_size: usize, device: Device, data: Vec<T>) -> Result<Self> {
        let expected = shape.size() * batch_size;
        if data.len() != expected {
            return Err(Error::values(format!("tensor {}", shape), expected, data.len()));
        }
        let mut tensor = Self::new(shape, batch_size, device);
        tensor.data_mut()?.copy_from_slice(&data);
        Ok(tensor)
    }

    fn buffer_len(shape: &Shape, batch_size: usize, device: Device) -> usize {
        device.padded_len(shape.size() * batch_size, std::mem::size_of::<T>())
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Logical element count (all samples, excluding padding).
    pub fn len(&self) -> usize {
        self.shape.size() * self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated element count including device padding, or 0 when forwarded.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map(|buf| buf.data.len()).unwrap_or(0)
    }

    /// Whether this tensor currently owns a buffer.
    pub fn is_owned(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn data(&self) -> Result<&[T]> {
        let len = self.len();
        self.buffer
            .as_ref()
            .map(|buf| &buf.data[..len])
            .ok_or_else(|| Error::OwnershipViolation(format!("read of tensor {}", self.shape)))
    }

    pub fn data_mut(&mut self) -> Result<&mut [T]> {
        let len = self.len();
        let shape = &self.shape;
        self.buffer
            .as_mut()
            .map(|buf| &mut buf.data[..len])
            .ok_or_else(|| Error::OwnershipViolation(format!("write of tensor {}", shape)))
    }

    /// Elements of one sample.
    pub fn sample(&self, batch_idx: usize) -> Result<&[T]> {
        let size = self.shape.size();
        self.check_batch(batch_idx, 0)?;
        Ok(&self.data()?[batch_idx * size..(batch_idx + 1) * size])
    }

    pub fn sample_mut(&mut self, batch_idx: usize) -> Result<&mut [T]> {
        let size = self.shape.size();
        self.check_batch(batch_idx, 0)?;
        Ok(&mut self.data_mut()?[batch_idx * size..(batch_idx + 1) * size])
    }

    /// Bounds-checked element access within one sample.
    pub fn at(&self, batch_idx: usize, index: usize) -> Result<T> {
        self.check_batch(batch_idx, index)?;
        Ok(self.data()?[batch_idx * self.shape.size() + index])
    }

    pub fn set(&mut self, batch_idx: usize, index: usize, value: T) -> Result<()> {
        self.check_batch(batch_idx, index)?;
        let offset = batch_idx * self.shape.size() + index;
        self.data_mut()?[offset] = value;
        Ok(())
    }

    fn check_batch(&self, batch_idx: usize, index: usize) -> Result<()> {
        if batch_idx >= self.batch_size || index >= self.shape.size() {
            return Err(Error::IndexOutOfBounds {
                batch: batch_idx,
                index,
                batch_size: self.batch_size,
                size: self.shape.size(),
            });
        }
        Ok(())
    }

    /// Reallocate for a new batch size. Prior contents are discarded.
    pub fn change_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
        let len = Self::buffer_len(&self.shape, batch_size, self.device);
        self.buffer = Some(TensorBuffer::zeroed(len));
    }

    /// Reshape without touching data; total element count must match.
    pub fn reshape(&mut self, dims: impl Into<Vec<usize>>) -> Result<()> {
        self.shape.reshape(dims)
    }

    /// Allocate a fresh zeroed buffer if this tensor was forwarded away.
    pub fn ensure_owned(&mut self) {
        if self.buffer.is_none() {
            let len = Self::buffer_len(&self.shape, self.batch_size, self.device);
            self.buffer = Some(TensorBuffer::zeroed(len));
        }
    }

    pub fn fill(&mut self, value: T) -> Result<()> {
        self.data_mut()?.iter_mut().for_each(|x| *x = value);
        Ok(())
    }

    /// Deep copy of the owned contents into a new tensor with state 0.
    pub fn duplicate(&self) -> Result<Self> {
        Self::from_vec(
            self.shape.clone(),
            self.batch_size,
            self.device,
            self.data()?.to_vec(),
        )
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.data()?.to_vec())
    }

    /// Current version counter (acquire).
    pub fn state(&self) -> usize {
        self.state.load(Ordering::Acquire)
    }

    /// Publish one more completed production of this tensor (release).
    pub(crate) fn increment_state(&self) -> usize {
        self.state.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_state(&self) {
        self.state.store(0, Ordering::Release);
    }

    fn same_layout(src: &Tensor<T>, dst: &Tensor<T>) -> Result<()> {
        if src.device != dst.device {
            return Err(Error::DeviceMismatch {
                src: src.device,
                dst: dst.device,
            });
        }
        if src.shape.size() != dst.shape.size() || src.batch_size != dst.batch_size {
            return Err(Error::ShapeMismatch {
                context: "tensor hand-off".to_string(),
                expected: format!("{} x{}", dst.shape, dst.batch_size),
                got: format!("{} x{}", src.shape, src.batch_size),
            });
        }
        Ok(())
    }
}

/// Move `src`'s buffer into `dst` without copying. `src` is left empty.
pub fn forward_tensor_data<T: Scalar>(src: &mut Tensor<T>, dst: &mut Tensor<T>) -> Result<()> {
    Tensor::same_layout(src, dst)?;
    let buffer = src
        .buffer
        .take()
        .ok_or_else(|| Error::OwnershipViolation(format!("forward of tensor {}", src.shape)))?;
    dst.buffer = Some(buffer);
    Ok(())
}

/// Element-wise deep copy of `src` into `dst`.
pub fn copy_tensor_data<T: Scalar>(src: &Tensor<T>, dst: &mut Tensor<T>) -> Result<()> {
    Tensor::same_layout(src, dst)?;
    if src.shape != dst.shape {
        return Err(Error::shape("tensor copy", &dst.shape, &src.shape));
    }
    let data = src.data()?;
    dst.ensure_owned();
    dst.data_mut()?.copy_from_slice(data);
    Ok(())
}

impl<T: Scalar> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("batch_size", &self.batch_size)
            .field("device", &self.device)
            .field("state", &self.state())
            .field("owned", &self.is_owned())
            .finish()
    }
}
