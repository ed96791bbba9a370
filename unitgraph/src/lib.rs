//! Computation-graph execution engine.
//!
//! Units are described by [`UnitMetaData`], registered on a [`UnitManager`]
//! and compiled into an executable graph where every edge is a [`CopyUnit`].
//! Forward and backward passes are driven per cycle, synchronously or on a
//! worker pool, with readiness derived from tensor state counters.
pub mod logging;

mod config;
mod error;
mod manager;
mod ops;
mod random;
mod strategy;
mod tensor;
mod unit;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use manager::{join_all, CancelToken, Completion, CycleReport, Direction, UnitManager, WorkerPool};
pub use random::Random;
pub use strategy::{
    Activation, Adam, Constant, CrossEntropy, HeUniform, Identity, Initializer, Loss,
    MeanSquaredError, Momentum, Ones, Optimizer, OptimizerFactory, RandomUniform, ReLU, Sgd,
    Sigmoid, SoftMax, StrategyRegistry, Tanh, XavierUniform, Zeros,
};
pub use tensor::{
    compute_strides, copy_tensor_data, forward_tensor_data, numel, Device, Scalar, Shape, Tensor,
    TensorBuffer,
};
pub use unit::{
    lock_unit, ActivationUnit, BaseKind, BuildContext, Compute, ComputableUnit, ConstantUnit,
    CopyUnit, DataLoader, DenseUnit, LossUnit, Parameter, Parameters, PlaceHolderUnit, SharedUnit,
    StateSnapshot, UnitId, UnitKind, UnitMetaData, UnitState, UnitTensors, UnitType, ACTIVATION,
    BIAS, CONSTANT, DENSE, INPUT, LABEL, LOSS, PLACEHOLDER, PREDICTION, WEIGHT,
};

/// Kernels units compute with, exposed for custom `Compute` implementations.
pub mod kernels {
    pub use crate::ops::*;
}
