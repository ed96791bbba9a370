use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::tensor::Scalar;

/// Seeded uniform generator used by the random initializers.
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fill `out` with samples from `[low, high]`.
    pub fn fill_uniform<T: Scalar>(&mut self, out: &mut [T], low: f64, high: f64) -> Result<()> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(Error::InvalidParameter {
                name: "range".to_string(),
                reason: format!("invalid uniform range [{}, {}]", low, high),
            });
        }
        for value in out.iter_mut() {
            *value = T::from_f64(self.rng.gen_range(low..=high));
        }
        Ok(())
    }

    pub fn generate_with_seed<T: Scalar>(seed: u64, range: (f64, f64), len: usize) -> Result<Vec<T>> {
        let mut out = vec![T::zero(); len];
        Self::with_seed(seed).fill_uniform(&mut out, range.0, range.1)?;
        Ok(out)
    }
}
