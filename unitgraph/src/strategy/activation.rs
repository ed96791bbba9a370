use crate::error::{Error, Result};
use crate::ops;
use crate::tensor::{Scalar, Shape};

/// Element-wise or row-wise activation applied to one sample.
pub trait Activation<T: Scalar>: Send + Sync {
    fn apply(&self, input: &[T], output: &mut [T], shape: &Shape) -> Result<()>;

    /// Gradient with respect to the input given the upstream gradient.
    fn derivative(
        &self,
        input: &[T],
        output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        shape: &Shape,
    ) -> Result<()>;
}

pub struct Identity;

impl<T: Scalar> Activation<T> for Identity {
    fn apply(&self, input: &[T], output: &mut [T], _shape: &Shape) -> Result<()> {
        ops::unary(input, output, |x| x)
    }

    fn derivative(
        &self,
        _input: &[T],
        _output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        _shape: &Shape,
    ) -> Result<()> {
        ops::unary(grad_output, grad_input, |g| g)
    }
}

pub struct ReLU;

impl<T: Scalar> Activation<T> for ReLU {
    fn apply(&self, input: &[T], output: &mut [T], _shape: &Shape) -> Result<()> {
        ops::unary(input, output, |x| x.max(T::zero()))
    }

    fn derivative(
        &self,
        input: &[T],
        _output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        _shape: &Shape,
    ) -> Result<()> {
        ops::zip_map(input, grad_output, grad_input, |x, g| {
            if x > T::zero() {
                g
            } else {
                T::zero()
            }
        })
    }
}

pub struct Sigmoid;

impl<T: Scalar> Activation<T> for Sigmoid {
    fn apply(&self, input: &[T], output: &mut [T], _shape: &Shape) -> Result<()> {
        ops::unary(input, output, |x| T::one() / (T::one() + (-x).exp()))
    }

    fn derivative(
        &self,
        _input: &[T],
        output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        _shape: &Shape,
    ) -> Result<()> {
        ops::zip_map(output, grad_output, grad_input, |y, g| g * y * (T::one() - y))
    }
}

pub struct Tanh;

impl<T: Scalar> Activation<T> for Tanh {
    fn apply(&self, input: &[T], output: &mut [T], _shape: &Shape) -> Result<()> {
        ops::unary(input, output, |x| x.tanh())
    }

    fn derivative(
        &self,
        _input: &[T],
        output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        _shape: &Shape,
    ) -> Result<()> {
        ops::zip_map(output, grad_output, grad_input, |y, g| g * (T::one() - y * y))
    }
}

/// Softmax over the last dimension of each row.
pub struct SoftMax;

impl<T: Scalar> Activation<T> for SoftMax {
    fn apply(&self, input: &[T], output: &mut [T], shape: &Shape) -> Result<()> {
        let cols = shape.num_col();
        if input.len() != output.len() || input.len() % cols != 0 {
            return Err(Error::values("softmax", input.len(), output.len()));
        }
        for (row_in, row_out) in input.chunks(cols).zip(output.chunks_mut(cols)) {
            let max = row_in.iter().copied().fold(row_in[0], T::max);
            let mut sum = T::zero();
            for (y, x) in row_out.iter_mut().zip(row_in) {
                *y = (*x - max).exp();
                sum += *y;
            }
            ops::scale(row_out, T::one() / sum);
        }
        Ok(())
    }

    fn derivative(
        &self,
        _input: &[T],
        output: &[T],
        grad_output: &[T],
        grad_input: &mut [T],
        shape: &Shape,
    ) -> Result<()> {
        let cols = shape.num_col();
        if output.len() != grad_output.len() || output.len() != grad_input.len() {
            return Err(Error::values("softmax gradient", output.len(), grad_output.len()));
        }
        for ((y, g), dx) in output
            .chunks(cols)
            .zip(grad_output.chunks(cols))
            .zip(grad_input.chunks_mut(cols))
        {
            let mut dot = T::zero();
            for (yi, gi) in y.iter().zip(g) {
                dot += *yi * *gi;
            }
            for ((dxi, yi), gi) in dx.iter_mut().zip(y).zip(g) {
                *dxi = *yi * (*gi - dot);
            }
        }
        Ok(())
    }
}
