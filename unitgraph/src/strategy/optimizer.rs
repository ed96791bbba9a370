//! Parameter update rules applied by trainable units after their backward
//! pass. State (velocities, moments) is kept per internal variable name.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tensor::Scalar;
use crate::unit::Parameters;

pub trait Optimizer<T: Scalar>: Send {
    fn step(&mut self, name: &str, param: &mut [T], grad: &[T]) -> Result<()>;

    fn learning_rate(&self) -> f64;
}

fn check(name: &str, param: usize, grad: usize) -> Result<()> {
    if param != grad {
        return Err(Error::values(format!("optimizer step for {}", name), param, grad));
    }
    Ok(())
}

fn positive(params: &Parameters, name: &str, default: f64) -> Result<f64> {
    let value = params.float_or(name, default)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be positive, got {}", value),
        });
    }
    Ok(value)
}

/// Plain gradient descent: `param -= lr * grad`.
pub struct Sgd {
    lr: f64,
}

impl Sgd {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }

    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self::new(positive(params, "learning_rate", 0.01)?))
    }
}

impl<T: Scalar> Optimizer<T> for Sgd {
    fn step(&mut self, name: &str, param: &mut [T], grad: &[T]) -> Result<()> {
        check(name, param.len(), grad.len())?;
        let lr = T::from_f64(self.lr);
        for (p, g) in param.iter_mut().zip(grad) {
            *p = *p - lr * *g;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

/// `v = momentum * v - lr * grad; param += v`
pub struct Momentum<T> {
    lr: f64,
    momentum: f64,
    velocities: HashMap<String, Vec<T>>,
}

impl<T: Scalar> Momentum<T> {
    pub fn new(lr: f64, momentum: f64) -> Self {
        Self {
            lr,
            momentum,
            velocities: HashMap::new(),
        }
    }

    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        let lr = positive(params, "learning_rate", 0.01)?;
        let momentum = params.float_or("momentum", 0.9)?;
        if !(0.0..1.0).contains(&momentum) {
            return Err(Error::InvalidParameter {
                name: "momentum".to_string(),
                reason: format!("must be in [0, 1), got {}", momentum),
            });
        }
        Ok(Self::new(lr, momentum))
    }
}

impl<T: Scalar> Optimizer<T> for Momentum<T> {
    fn step(&mut self, name: &str, param: &mut [T], grad: &[T]) -> Result<()> {
        check(name, param.len(), grad.len())?;
        let lr = T::from_f64(self.lr);
        let momentum = T::from_f64(self.momentum);
        let velocity = self
            .velocities
            .entry(name.to_string())
            .or_insert_with(|| vec![T::zero(); param.len()]);
        for ((p, g), v) in param.iter_mut().zip(grad).zip(velocity.iter_mut()) {
            *v = momentum * *v - lr * *g;
            *p += *v;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

struct Moments<T> {
    m: Vec<T>,
    v: Vec<T>,
    t: i32,
}

/// Adam with bias-corrected first and second moments.
pub struct Adam<T> {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    moments: HashMap<String, Moments<T>>,
}

impl<T: Scalar> Adam<T> {
    pub fn new(lr: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            moments: HashMap::new(),
        }
    }

    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self::new(
            positive(params, "learning_rate", 0.001)?,
            params.float_or("beta1", 0.9)?,
            params.float_or("beta2", 0.999)?,
            positive(params, "epsilon", 1e-8)?,
        ))
    }
}

impl<T: Scalar> Optimizer<T> for Adam<T> {
    fn step(&mut self, name: &str, param: &mut [T], grad: &[T]) -> Result<()> {
        check(name, param.len(), grad.len())?;
        let state = self
            .moments
            .entry(name.to_string())
            .or_insert_with(|| Moments {
                m: vec![T::zero(); param.len()],
                v: vec![T::zero(); param.len()],
                t: 0,
            });
        state.t += 1;
        let b1 = T::from_f64(self.beta1);
        let b2 = T::from_f64(self.beta2);
        let c1 = T::from_f64(1.0 - self.beta1.powi(state.t));
        let c2 = T::from_f64(1.0 - self.beta2.powi(state.t));
        let lr = T::from_f64(self.lr);
        let eps = T::from_f64(self.epsilon);
        for (i, (p, g)) in param.iter_mut().zip(grad).enumerate() {
            state.m[i] = b1 * state.m[i] + (T::one() - b1) * *g;
            state.v[i] = b2 * state.v[i] + (T::one() - b2) * *g * *g;
            let m_hat = state.m[i] / c1;
            let v_hat = state.v[i] / c2;
            *p = *p - lr * m_hat / (v_hat.sqrt() + eps);
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}
