//! Named, swappable algorithms looked up while compiling a graph.
//!
//! The registry is an ordinary value handed to `UnitManager::new`; there is no
//! process-wide table.
mod activation;
mod initializer;
mod loss;
mod optimizer;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tensor::Scalar;
use crate::unit::Parameters;

pub use activation::{Activation, Identity, ReLU, Sigmoid, SoftMax, Tanh};
pub use initializer::{Constant, HeUniform, Initializer, Ones, RandomUniform, XavierUniform, Zeros};
pub use loss::{CrossEntropy, Loss, MeanSquaredError};
pub use optimizer::{Adam, Momentum, Optimizer, Sgd};

pub type OptimizerFactory<T> =
    Arc<dyn Fn(&Parameters) -> Result<Box<dyn Optimizer<T>>> + Send + Sync>;

pub struct StrategyRegistry<T: Scalar> {
    activations: HashMap<String, Arc<dyn Activation<T>>>,
    losses: HashMap<String, Arc<dyn Loss<T>>>,
    initializers: HashMap<String, Arc<dyn Initializer<T>>>,
    optimizers: HashMap<String, OptimizerFactory<T>>,
}

impl<T: Scalar> StrategyRegistry<T> {
    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            activations: HashMap::new(),
            losses: HashMap::new(),
            initializers: HashMap::new(),
            optimizers: HashMap::new(),
        }
    }

    /// Registry with every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_activation("Identity", Identity);
        registry.register_activation("ReLU", ReLU);
        registry.register_activation("Sigmoid", Sigmoid);
        registry.register_activation("Tanh", Tanh);
        registry.register_activation("SoftMax", SoftMax);

        registry.register_loss("MSE", MeanSquaredError);
        registry.register_loss("CrossEntropy", CrossEntropy);

        registry.register_initializer("Zeros", Zeros);
        registry.register_initializer("Ones", Ones);
        registry.register_initializer("Constant", Constant);
        registry.register_initializer("Identity", initializer::Identity);
        registry.register_initializer("RandomUniform", RandomUniform);
        registry.register_initializer("XavierUniform", XavierUniform);
        registry.register_initializer("HeUniform", HeUniform);

        registry.register_optimizer("SGD", |params| {
            Ok(Box::new(Sgd::from_parameters(params)?) as Box<dyn Optimizer<T>>)
        });
        registry.register_optimizer("Momentum", |params| {
            Ok(Box::new(Momentum::<T>::from_parameters(params)?) as Box<dyn Optimizer<T>>)
        });
        registry.register_optimizer("Adam", |params| {
            Ok(Box::new(Adam::<T>::from_parameters(params)?) as Box<dyn Optimizer<T>>)
        });
        registry
    }

    pub fn register_activation(&mut self, name: &str, activation: impl Activation<T> + 'static) {
        self.activations.insert(name.to_string(), Arc::new(activation));
    }

    pub fn register_loss(&mut self, name: &str, loss: impl Loss<T> + 'static) {
        self.losses.insert(name.to_string(), Arc::new(loss));
    }

    pub fn register_initializer(&mut self, name: &str, initializer: impl Initializer<T> + 'static) {
        self.initializers.insert(name.to_string(), Arc::new(initializer));
    }

    pub fn register_optimizer<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Parameters) -> Result<Box<dyn Optimizer<T>>> + Send + Sync + 'static,
    {
        self.optimizers.insert(name.to_string(), Arc::new(factory));
    }

    pub fn activation(&self, name: &str) -> Result<Arc<dyn Activation<T>>> {
        self.activations
            .get(name)
            .cloned()
            .ok_or_else(|| unknown("activation", name))
    }

    pub fn loss(&self, name: &str) -> Result<Arc<dyn Loss<T>>> {
        self.losses.get(name).cloned().ok_or_else(|| unknown("loss", name))
    }

    pub fn initializer(&self, name: &str) -> Result<Arc<dyn Initializer<T>>> {
        self.initializers
            .get(name)
            .cloned()
            .ok_or_else(|| unknown("initializer", name))
    }

    pub fn has_optimizer(&self, name: &str) -> bool {
        self.optimizers.contains_key(name)
    }

    /// Build a fresh optimizer instance; each trainable unit gets its own.
    pub fn optimizer(&self, name: &str, params: &Parameters) -> Result<Box<dyn Optimizer<T>>> {
        let factory = self.optimizers.get(name).ok_or_else(|| unknown("optimizer", name))?;
        factory(params)
    }
}

impl<T: Scalar> Default for StrategyRegistry<T> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn unknown(kind: &'static str, name: &str) -> Error {
    Error::UnknownStrategy {
        kind,
        name: name.to_string(),
    }
}
