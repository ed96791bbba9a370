use crate::error::{Error, Result};
use crate::random::Random;
use crate::tensor::{Scalar, Shape};
use crate::unit::Parameters;

/// Fills an internal tensor (weights, biases) at compile time.
///
/// `name` is the internal variable name; initializers may read
/// `<name>_value`, `low`/`high` and `seed` from the unit's parameters.
pub trait Initializer<T: Scalar>: Send + Sync {
    fn initialize(&self, name: &str, shape: &Shape, params: &Parameters, out: &mut [T]) -> Result<()>;
}

pub struct Zeros;

impl<T: Scalar> Initializer<T> for Zeros {
    fn initialize(&self, _name: &str, _shape: &Shape, _params: &Parameters, out: &mut [T]) -> Result<()> {
        out.iter_mut().for_each(|x| *x = T::zero());
        Ok(())
    }
}

pub struct Ones;

impl<T: Scalar> Initializer<T> for Ones {
    fn initialize(&self, _name: &str, _shape: &Shape, _params: &Parameters, out: &mut [T]) -> Result<()> {
        out.iter_mut().for_each(|x| *x = T::one());
        Ok(())
    }
}

/// Fills with `<name>_value`, falling back to `value`.
pub struct Constant;

impl<T: Scalar> Initializer<T> for Constant {
    fn initialize(&self, name: &str, _shape: &Shape, params: &Parameters, out: &mut [T]) -> Result<()> {
        let key = format!("{}_value", name);
        let value = match params.float(&key)? {
            Some(value) => value,
            None => params.float("value")?.ok_or_else(|| Error::InvalidParameter {
                name: key,
                reason: "constant initializer needs a value".to_string(),
            })?,
        };
        out.iter_mut().for_each(|x| *x = T::from_f64(value));
        Ok(())
    }
}

/// Ones on the main diagonal of every stacked matrix, zeros elsewhere.
pub struct Identity;

impl<T: Scalar> Initializer<T> for Identity {
    fn initialize(&self, _name: &str, shape: &Shape, _params: &Parameters, out: &mut [T]) -> Result<()> {
        let rows = shape.num_row();
        let cols = shape.num_col();
        out.iter_mut().for_each(|x| *x = T::zero());
        for matrix in out.chunks_mut(rows * cols) {
            for i in 0..rows.min(cols) {
                matrix[i * cols + i] = T::one();
            }
        }
        Ok(())
    }
}

fn seed_for(name: &str, params: &Parameters) -> Result<u64> {
    let seed = params.int_or("seed", 0)? as u64;
    // FNV-1a over the variable name so weight and bias draw different streams.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    Ok(seed ^ hash)
}

pub struct RandomUniform;

impl<T: Scalar> Initializer<T> for RandomUniform {
    fn initialize(&self, name: &str, _shape: &Shape, params: &Parameters, out: &mut [T]) -> Result<()> {
        let low = params.float_or("low", -1.0)?;
        let high = params.float_or("high", 1.0)?;
        Random::with_seed(seed_for(name, params)?).fill_uniform(out, low, high)
    }
}

/// Glorot uniform: `±sqrt(6 / (fan_in + fan_out))`.
pub struct XavierUniform;

impl<T: Scalar> Initializer<T> for XavierUniform {
    fn initialize(&self, name: &str, shape: &Shape, params: &Parameters, out: &mut [T]) -> Result<()> {
        let fan = (shape.num_row() + shape.num_col()) as f64;
        let limit = (6.0 / fan).sqrt();
        Random::with_seed(seed_for(name, params)?).fill_uniform(out, -limit, limit)
    }
}

/// He uniform: `±sqrt(6 / fan_in)`.
pub struct HeUniform;

impl<T: Scalar> Initializer<T> for HeUniform {
    fn initialize(&self, name: &str, shape: &Shape, params: &Parameters, out: &mut [T]) -> Result<()> {
        let limit = (6.0 / shape.num_row() as f64).sqrt();
        Random::with_seed(seed_for(name, params)?).fill_uniform(out, -limit, limit)
    }
}
