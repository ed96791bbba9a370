//! Edge unit moving a tensor between two units' slots.
//!
//! Forward hands the producer's output to the consumer's input slot keyed by
//! the producer id; backward hands the consumer's gradient for the producer
//! to the producer's backward input slot keyed by the consumer id. The copy
//! unit never owns tensor data itself, only its own counters.
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::manager::{Completion, Direction, WorkerPool};
use crate::tensor::{copy_tensor_data, forward_tensor_data, Scalar, Tensor};

use super::computable::{lock_unit, ComputableUnit, SharedUnit};
use super::id::{UnitId, UnitType};
use super::state::UnitState;

pub struct CopyUnit {
    id: UnitId,
    producer: UnitId,
    consumer: UnitId,
    /// Move the buffer instead of copying it. Only valid when the consumer is
    /// the producer's sole reader.
    forward_move: bool,
    state: UnitState,
}

impl CopyUnit {
    pub fn new(id: usize, producer: UnitId, consumer: UnitId, forward_move: bool) -> Self {
        let name = format!("{}->{}", producer.name, consumer.name);
        Self {
            id: UnitId::new(UnitType::copy(), id, &name),
            producer,
            consumer,
            forward_move,
            state: UnitState::default(),
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn producer(&self) -> &UnitId {
        &self.producer
    }

    pub fn consumer(&self) -> &UnitId {
        &self.consumer
    }

    pub fn is_forward_move(&self) -> bool {
        self.forward_move
    }

    pub fn state(&self) -> &UnitState {
        &self.state
    }

    pub fn is_ready<T: Scalar>(
        &self,
        direction: Direction,
        producer: &ComputableUnit<T>,
        consumer: &ComputableUnit<T>,
        cycle: usize,
    ) -> bool {
        match direction {
            Direction::Forward => self.is_forward_ready(producer, consumer, cycle),
            Direction::Backward => self.is_backward_ready(producer, consumer, cycle),
        }
    }

    /// Source output freshly produced for `cycle`, destination slot not yet.
    pub fn is_forward_ready<T: Scalar>(
        &self,
        producer: &ComputableUnit<T>,
        consumer: &ComputableUnit<T>,
        cycle: usize,
    ) -> bool {
        let dst = consumer.tensors().forward_inputs.get(&self.producer);
        producer.tensors().forward_output.state() == cycle + 1
            && dst.map_or(false, |tensor| tensor.state() == cycle)
    }

    pub fn is_backward_ready<T: Scalar>(
        &self,
        producer: &ComputableUnit<T>,
        consumer: &ComputableUnit<T>,
        cycle: usize,
    ) -> bool {
        let src = consumer.tensors().backward_outputs.get(&self.producer);
        let dst = producer.tensors().backward_inputs.get(&self.consumer);
        src.map_or(false, |tensor| tensor.state() == cycle + 1)
            && dst.map_or(false, |tensor| tensor.state() == cycle)
    }

    pub fn forward<T: Scalar>(
        &self,
        producer: &mut ComputableUnit<T>,
        consumer: &mut ComputableUnit<T>,
        cycle: usize,
    ) -> Result<()> {
        if !self.is_forward_ready(producer, consumer, cycle) {
            return Err(self.not_ready(cycle));
        }
        let src = &mut producer.tensors_mut().forward_output;
        let dst = slot(&mut consumer.tensors_mut().forward_inputs, &self.producer)?;
        if self.forward_move {
            forward_tensor_data(src, dst)?;
        } else {
            copy_tensor_data(src, dst)?;
        }
        dst.increment_state();
        self.state.increment_forward();
        Ok(())
    }

    /// Gradients always move: the consumer keeps one backward output per
    /// producer, so there is exactly one reader.
    pub fn backward<T: Scalar>(
        &self,
        producer: &mut ComputableUnit<T>,
        consumer: &mut ComputableUnit<T>,
        cycle: usize,
    ) -> Result<()> {
        if !self.is_backward_ready(producer, consumer, cycle) {
            return Err(self.not_ready(cycle));
        }
        let src = slot(&mut consumer.tensors_mut().backward_outputs, &self.producer)?;
        let dst = slot(&mut producer.tensors_mut().backward_inputs, &self.consumer)?;
        forward_tensor_data(src, dst)?;
        dst.increment_state();
        self.state.increment_backward();
        Ok(())
    }

    pub fn run<T: Scalar>(
        &self,
        direction: Direction,
        producer: &mut ComputableUnit<T>,
        consumer: &mut ComputableUnit<T>,
        cycle: usize,
    ) -> Result<()> {
        match direction {
            Direction::Forward => self.forward(producer, consumer, cycle),
            Direction::Backward => self.backward(producer, consumer, cycle),
        }
    }

    /// Submit the hand-off to the pool. Producer is locked before consumer in
    /// both directions, so lock acquisition follows graph edges.
    pub fn submit<T: Scalar>(
        copy: &Arc<CopyUnit>,
        producer: &SharedUnit<T>,
        consumer: &SharedUnit<T>,
        pool: &WorkerPool,
        direction: Direction,
        cycle: usize,
    ) -> Completion<()> {
        let label = format!("{} {}", direction, copy.id);
        let copy = Arc::clone(copy);
        let producer = Arc::clone(producer);
        let consumer = Arc::clone(consumer);
        pool.submit(label, move || {
            let mut src = lock_unit(&producer)?;
            let mut dst = lock_unit(&consumer)?;
            copy.run(direction, &mut src, &mut dst, cycle)
        })
    }

    pub fn reset(&self) {
        self.state.reset();
    }

    fn not_ready(&self, cycle: usize) -> Error {
        Error::NotReady {
            unit: self.id.to_string(),
            cycle,
        }
    }
}

fn slot<'a, T: Scalar>(
    map: &'a mut HashMap<UnitId, Tensor<T>>,
    key: &UnitId,
) -> Result<&'a mut Tensor<T>> {
    map.get_mut(key).ok_or_else(|| Error::UnknownUnit(key.clone()))
}
