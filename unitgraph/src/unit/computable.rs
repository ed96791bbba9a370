//! Runtime unit: tensors, readiness predicates and state updates.
//!
//! Readiness is derived purely from tensor `State` counters compared against
//! the cycle number `c`:
//! - forward-ready(c): every forward input is at `c + 1` and the forward
//!   output is still at `c`.
//! - backward-ready(c): the unit has backward outputs, every backward input is
//!   at `c + 1` and every backward output is still at `c`.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::manager::{Completion, Direction, WorkerPool};
use crate::strategy::{Optimizer, StrategyRegistry};
use crate::tensor::{Scalar, Shape, Tensor};

use super::activation::ActivationUnit;
use super::constant::ConstantUnit;
use super::dense::DenseUnit;
use super::id::{self, UnitId};
use super::loss::LossUnit;
use super::metadata::UnitMetaData;
use super::placeholder::{DataLoader, PlaceHolderUnit};
use super::state::UnitState;

pub type SharedUnit<T> = Arc<Mutex<ComputableUnit<T>>>;

/// Lock a unit, mapping poisoning (a panicked task) to an error.
pub fn lock_unit<T: Scalar>(unit: &SharedUnit<T>) -> Result<MutexGuard<'_, ComputableUnit<T>>> {
    unit.lock()
        .map_err(|err| Error::LockPoisoned(format!("unit lock: {}", err)))
}

/// Tensors owned by one unit. Neighbor-facing maps are keyed by the
/// neighbor's `UnitId`; there is no separate edge object.
pub struct UnitTensors<T: Scalar> {
    pub forward_inputs: HashMap<UnitId, Tensor<T>>,
    pub backward_inputs: HashMap<UnitId, Tensor<T>>,
    pub backward_outputs: HashMap<UnitId, Tensor<T>>,
    pub forward_output: Tensor<T>,
    pub internal: HashMap<String, Tensor<T>>,
}

impl<T: Scalar> UnitTensors<T> {
    pub fn forward_input(&self, unit: &UnitId) -> Result<&Tensor<T>> {
        self.forward_inputs
            .get(unit)
            .ok_or_else(|| Error::UnknownUnit(unit.clone()))
    }

    pub fn backward_output_mut(&mut self, unit: &UnitId) -> Result<&mut Tensor<T>> {
        self.backward_outputs
            .get_mut(unit)
            .ok_or_else(|| Error::UnknownUnit(unit.clone()))
    }

    /// Sum of every downstream gradient, shaped like the forward output.
    pub fn gathered_gradient(&self) -> Result<Vec<T>> {
        let mut grad = vec![T::zero(); self.forward_output.len()];
        for tensor in self.backward_inputs.values() {
            crate::ops::add_assign(&mut grad, tensor.data()?)?;
        }
        Ok(grad)
    }

    fn for_each_io(&self, mut f: impl FnMut(&Tensor<T>)) {
        self.forward_inputs.values().for_each(&mut f);
        self.backward_inputs.values().for_each(&mut f);
        self.backward_outputs.values().for_each(&mut f);
        f(&self.forward_output);
    }

    fn for_each_io_mut(&mut self, mut f: impl FnMut(&mut Tensor<T>)) {
        self.forward_inputs.values_mut().for_each(&mut f);
        self.backward_inputs.values_mut().for_each(&mut f);
        self.backward_outputs.values_mut().for_each(&mut f);
        f(&mut self.forward_output);
    }
}

/// Compute contract every unit variant implements.
pub trait Compute<T: Scalar>: Send {
    fn forward(&mut self, tensors: &mut UnitTensors<T>, cycle: usize) -> Result<()>;

    fn backward(&mut self, tensors: &mut UnitTensors<T>, cycle: usize) -> Result<()>;
}

/// Closed set of unit variants.
pub enum UnitKind<T: Scalar> {
    Constant(ConstantUnit<T>),
    PlaceHolder(PlaceHolderUnit<T>),
    Dense(DenseUnit<T>),
    Activation(ActivationUnit<T>),
    Loss(LossUnit<T>),
}

impl<T: Scalar> UnitKind<T> {
    fn compute(&mut self) -> &mut dyn Compute<T> {
        match self {
            UnitKind::Constant(unit) => unit as &mut dyn Compute<T>,
            UnitKind::PlaceHolder(unit) => unit as &mut dyn Compute<T>,
            UnitKind::Dense(unit) => unit as &mut dyn Compute<T>,
            UnitKind::Activation(unit) => unit as &mut dyn Compute<T>,
            UnitKind::Loss(unit) => unit as &mut dyn Compute<T>,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            UnitKind::Constant(_) => id::CONSTANT,
            UnitKind::PlaceHolder(_) => id::PLACEHOLDER,
            UnitKind::Dense(_) => id::DENSE,
            UnitKind::Activation(_) => id::ACTIVATION,
            UnitKind::Loss(_) => id::LOSS,
        }
    }
}

/// Everything needed to materialize one unit at compile time.
pub struct BuildContext<'a, T: Scalar> {
    pub registry: &'a StrategyRegistry<T>,
    pub batch_size: usize,
    pub optimizer: Option<Box<dyn Optimizer<T>>>,
    pub loader: Option<DataLoader<T>>,
}

pub struct ComputableUnit<T: Scalar> {
    id: UnitId,
    batch_size: usize,
    tensors: UnitTensors<T>,
    state: UnitState,
    kind: UnitKind<T>,
}

impl<T: Scalar> ComputableUnit<T> {
    /// Materialize a unit from its (already wired) metadata.
    pub fn build(meta: &UnitMetaData, ctx: BuildContext<'_, T>) -> Result<Self> {
        let batch = ctx.batch_size;
        let device = meta.device;
        let mut forward_inputs = HashMap::new();
        let mut backward_outputs = HashMap::new();
        for (slot, unit) in &meta.input_units {
            let shape = meta.input_shape(slot)?.clone();
            forward_inputs.insert(unit.clone(), Tensor::new(shape.clone(), batch, device));
            backward_outputs.insert(unit.clone(), Tensor::new(shape, batch, device));
        }
        let mut backward_inputs = HashMap::new();
        for unit in &meta.output_units {
            backward_inputs.insert(
                unit.clone(),
                Tensor::new(meta.output_shape.clone(), batch, device),
            );
        }
        let mut internal = HashMap::new();
        for (name, shape) in &meta.internal_variable_shapes {
            let init_name = meta.initializers.get(name).ok_or_else(|| Error::MissingInput {
                unit: meta.unit_id.clone(),
                what: "initializer",
                name: name.clone(),
            })?;
            let initializer = ctx.registry.initializer(init_name)?;
            let mut tensor = Tensor::new(shape.clone(), 1, device);
            initializer.initialize(name, shape, &meta.parameters, tensor.data_mut()?)?;
            internal.insert(name.clone(), tensor);
        }
        let tensors = UnitTensors {
            forward_inputs,
            backward_inputs,
            backward_outputs,
            forward_output: Tensor::new(meta.output_shape.clone(), batch, device),
            internal,
        };

        let kind = match meta.unit_id.unit_type.name() {
            id::CONSTANT => UnitKind::Constant(ConstantUnit::build(meta)?),
            id::PLACEHOLDER => {
                let loader = ctx
                    .loader
                    .ok_or_else(|| Error::MissingLoader(meta.unit_id.clone()))?;
                UnitKind::PlaceHolder(PlaceHolderUnit::new(loader))
            }
            id::DENSE => {
                let optimizer = ctx.optimizer.ok_or_else(|| Error::MissingInput {
                    unit: meta.unit_id.clone(),
                    what: "optimizer",
                    name: id::DENSE.to_string(),
                })?;
                UnitKind::Dense(DenseUnit::build(meta, optimizer)?)
            }
            id::ACTIVATION => UnitKind::Activation(ActivationUnit::build(meta, ctx.registry)?),
            id::LOSS => UnitKind::Loss(LossUnit::build(meta, ctx.registry)?),
            other => {
                return Err(Error::UnknownStrategy {
                    kind: "unit type",
                    name: other.to_string(),
                })
            }
        };

        Ok(Self {
            id: meta.unit_id.clone(),
            batch_size: batch,
            tensors,
            state: UnitState::default(),
            kind,
        })
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn kind(&self) -> &UnitKind<T> {
        &self.kind
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> &UnitState {
        &self.state
    }

    pub fn tensors(&self) -> &UnitTensors<T> {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut UnitTensors<T> {
        &mut self.tensors
    }

    pub fn output_shape(&self) -> &Shape {
        self.tensors.forward_output.shape()
    }

    pub fn is_forward_ready(&self, cycle: usize) -> bool {
        self.tensors
            .forward_inputs
            .values()
            .all(|tensor| tensor.state() == cycle + 1)
            && self.tensors.forward_output.state() == cycle
    }

    pub fn is_backward_ready(&self, cycle: usize) -> bool {
        !self.tensors.backward_outputs.is_empty()
            && self
                .tensors
                .backward_inputs
                .values()
                .all(|tensor| tensor.state() == cycle + 1)
            && self
                .tensors
                .backward_outputs
                .values()
                .all(|tensor| tensor.state() == cycle)
    }

    pub fn is_ready(&self, direction: Direction, cycle: usize) -> bool {
        match direction {
            Direction::Forward => self.is_forward_ready(cycle),
            Direction::Backward => self.is_backward_ready(cycle),
        }
    }

    /// Whether this unit takes part in backward passes at all.
    pub fn has_backward(&self) -> bool {
        !self.tensors.backward_outputs.is_empty()
    }

    /// Run the forward computation. Callers check readiness first.
    pub fn forward(&mut self, cycle: usize) -> Result<()> {
        self.tensors.forward_output.ensure_owned();
        self.kind.compute().forward(&mut self.tensors, cycle)
    }

    pub fn backward(&mut self, cycle: usize) -> Result<()> {
        for tensor in self.tensors.backward_outputs.values_mut() {
            tensor.ensure_owned();
        }
        self.kind.compute().backward(&mut self.tensors, cycle)
    }

    pub fn update_forward(&self) {
        self.state.increment_forward();
        self.tensors.forward_output.increment_state();
    }

    pub fn update_backward(&self) {
        self.state.increment_backward();
        for tensor in self.tensors.backward_outputs.values() {
            tensor.increment_state();
        }
    }

    /// Execute and publish one pass in `direction`.
    pub fn run(&mut self, direction: Direction, cycle: usize) -> Result<()> {
        match direction {
            Direction::Forward => {
                self.forward(cycle)?;
                self.update_forward();
            }
            Direction::Backward => {
                self.backward(cycle)?;
                self.update_backward();
            }
        }
        Ok(())
    }

    /// Submit `forward` + `update_forward` to the worker pool.
    pub fn async_forward(unit: &SharedUnit<T>, pool: &WorkerPool, cycle: usize) -> Result<Completion<()>> {
        Self::submit(unit, pool, Direction::Forward, cycle)
    }

    pub fn async_backward(unit: &SharedUnit<T>, pool: &WorkerPool, cycle: usize) -> Result<Completion<()>> {
        Self::submit(unit, pool, Direction::Backward, cycle)
    }

    pub(crate) fn submit(
        unit: &SharedUnit<T>,
        pool: &WorkerPool,
        direction: Direction,
        cycle: usize,
    ) -> Result<Completion<()>> {
        let label = format!("{} {}", direction, lock_unit(unit)?.id);
        let unit = Arc::clone(unit);
        Ok(pool.submit(label, move || {
            let mut guard = lock_unit(&unit)?;
            guard.run(direction, cycle)
        }))
    }

    /// Zero every I/O tensor state and both counters.
    pub fn reset(&self) {
        self.tensors.for_each_io(|tensor| tensor.reset_state());
        self.state.reset();
    }

    /// Reallocate every I/O tensor for a new batch size and reset states.
    /// Internal tensors (weights) keep their values.
    pub fn change_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
        self.tensors
            .for_each_io_mut(|tensor| tensor.change_batch_size(batch_size));
        self.reset();
    }
}
