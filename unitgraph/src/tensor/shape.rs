//! Per-sample tensor shape.
//!
//! The last two dimensions are row and column for matrix-shaped data. Batch
//! size is carried separately by the tensor.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub fn numel(dims: &[usize]) -> usize {
    dims.iter().copied().product::<usize>()
}

pub fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut stride = 1usize;
    for (idx, dim) in dims.iter().rev().enumerate() {
        let i = dims.len() - 1 - idx;
        strides[i] = stride;
        stride = stride.saturating_mul(*dim);
    }
    strides
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Build a shape, rejecting empty ranks and zero-sized dimensions.
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();
        if dims.is_empty() || dims.iter().any(|dim| *dim == 0) {
            return Err(Error::InvalidShape(dims));
        }
        Ok(Self { dims })
    }

    /// Matrix shape `[rows, cols]`.
    pub fn matrix(rows: usize, cols: usize) -> Result<Self> {
        Self::new(vec![rows, cols])
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total element count of one sample.
    pub fn size(&self) -> usize {
        numel(&self.dims)
    }

    /// Second-to-last dimension, or 1 for rank-1 shapes.
    pub fn num_row(&self) -> usize {
        if self.dims.len() >= 2 {
            self.dims[self.dims.len() - 2]
        } else {
            1
        }
    }

    /// Last dimension.
    pub fn num_col(&self) -> usize {
        self.dims[self.dims.len() - 1]
    }

    /// Number of stacked matrices in front of the row/column dimensions.
    pub fn num_matrix(&self) -> usize {
        self.size() / (self.num_row() * self.num_col())
    }

    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.dims)
    }

    /// Linear offset of a multidimensional index within one sample.
    pub fn offset_of(&self, indices: &[usize]) -> Result<usize> {
        if indices.len() != self.dims.len() {
            return Err(Error::ShapeMismatch {
                context: "index".to_string(),
                expected: format!("{} indices", self.dims.len()),
                got: format!("{} indices", indices.len()),
            });
        }
        let mut offset = 0usize;
        for ((dim, stride), idx) in self.dims.iter().zip(self.strides()).zip(indices) {
            if *idx >= *dim {
                return Err(Error::IndexOutOfBounds {
                    batch: 0,
                    index: *idx,
                    batch_size: 1,
                    size: *dim,
                });
            }
            offset += idx * stride;
        }
        Ok(offset)
    }

    /// Reshape in place; the total element count must be preserved.
    pub fn reshape(&mut self, dims: impl Into<Vec<usize>>) -> Result<()> {
        let target = Shape::new(dims)?;
        if target.size() != self.size() {
            return Err(Error::shape("reshape", self, &target));
        }
        self.dims = target.dims;
        Ok(())
    }

    /// Shape of `self × other` treating both as matrices.
    pub fn matmul(&self, other: &Shape) -> Result<Shape> {
        if self.num_col() != other.num_row() || self.num_matrix() != other.num_matrix() {
            return Err(Error::shape("matmul", self, other));
        }
        let mut dims = self.dims.clone();
        let last = dims.len() - 1;
        dims[last] = other.num_col();
        if dims.len() == 1 {
            dims.insert(0, 1);
        }
        Shape::new(dims)
    }

    pub fn transposed(&self) -> Shape {
        let mut dims = self.dims.clone();
        if dims.len() == 1 {
            dims.insert(0, 1);
        }
        let last = dims.len() - 1;
        dims.swap(last - 1, last);
        Shape { dims }
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = Error;

    fn try_from(dims: Vec<usize>) -> Result<Self> {
        Shape::new(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.dims
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, dim) in self.dims.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "}}")
    }
}
