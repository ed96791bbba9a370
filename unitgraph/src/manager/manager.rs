//! Graph orchestration: registration, compilation and the cycle drivers.
//!
//! Units are appended as metadata, then `compile` materializes every unit and
//! inserts one copy unit per declared input edge. Drivers keep polling
//! readiness (derived from tensor state counters) until the pass is complete
//! or nothing can make progress; the topological order only decides which
//! unit is looked at first.
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::strategy::StrategyRegistry;
use crate::tensor::{Scalar, Shape, Tensor};
use crate::unit::{
    lock_unit, BuildContext, ComputableUnit, CopyUnit, DataLoader, Parameters, SharedUnit,
    StateSnapshot, UnitId, UnitMetaData, UnitType,
};

use super::scheduler::{join_all, CancelToken, Completion, WorkerPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// What one driver pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: usize,
    pub direction: Direction,
    /// Unit executions (each unit at most once per pass).
    pub executed: usize,
    /// Copy unit hand-offs.
    pub copies: usize,
    /// Passes that did work: sweeps that ran at least one unit or copy
    /// (sync), dispatch waves (async). The final idle scan is not counted.
    pub polls: usize,
}

impl CycleReport {
    fn new(direction: Direction, cycle: usize) -> Self {
        Self {
            cycle,
            direction,
            executed: 0,
            copies: 0,
            polls: 0,
        }
    }
}

struct CopyEdge {
    copy: Arc<CopyUnit>,
    producer: usize,
    consumer: usize,
}

/// Executable graph produced by `compile`. Read-only while a cycle runs.
struct Graph<T: Scalar> {
    /// Topological order.
    units: Vec<SharedUnit<T>>,
    index: HashMap<UnitId, usize>,
    copies: Vec<CopyEdge>,
    /// Copy indices per unit: edges leaving (forward) and entering (backward).
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl<T: Scalar> Graph<T> {
    fn unit(&self, id: &UnitId) -> Result<&SharedUnit<T>> {
        self.index
            .get(id)
            .map(|&idx| &self.units[idx])
            .ok_or_else(|| Error::UnknownUnit(id.clone()))
    }

    /// Unit positions in scan order for `direction`.
    fn scan_order(&self, direction: Direction) -> Vec<usize> {
        match direction {
            Direction::Forward => (0..self.units.len()).collect(),
            Direction::Backward => (0..self.units.len()).rev().collect(),
        }
    }

    fn copies_of(&self, idx: usize, direction: Direction) -> &[usize] {
        match direction {
            Direction::Forward => &self.outgoing[idx],
            Direction::Backward => &self.incoming[idx],
        }
    }

    fn copy_ready(&self, edge: usize, direction: Direction, cycle: usize) -> Result<bool> {
        let edge = &self.copies[edge];
        let producer = lock_unit(&self.units[edge.producer])?;
        let consumer = lock_unit(&self.units[edge.consumer])?;
        Ok(edge.copy.is_ready(direction, &producer, &consumer, cycle))
    }

    /// Run the copy if it is ready. Producer is always locked first.
    fn try_copy(&self, edge: usize, direction: Direction, cycle: usize) -> Result<bool> {
        let edge = &self.copies[edge];
        let mut producer = lock_unit(&self.units[edge.producer])?;
        let mut consumer = lock_unit(&self.units[edge.consumer])?;
        if !edge.copy.is_ready(direction, &producer, &consumer, cycle) {
            return Ok(false);
        }
        edge.copy.run(direction, &mut producer, &mut consumer, cycle)?;
        crate::detail!("{} {} cycle={}", direction, edge.copy.id(), cycle);
        Ok(true)
    }

    /// Every participating unit and copy has advanced to `cycle + 1`.
    fn pending(&self, direction: Direction, cycle: usize) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for unit in &self.units {
            let guard = lock_unit(unit)?;
            let count = match direction {
                Direction::Forward => guard.state().forward_count(),
                Direction::Backward if guard.has_backward() => guard.state().backward_count(),
                Direction::Backward => continue,
            };
            if count != cycle + 1 {
                pending.push(guard.id().to_string());
            }
        }
        for edge in &self.copies {
            let state = edge.copy.state();
            let count = match direction {
                Direction::Forward => state.forward_count(),
                Direction::Backward => state.backward_count(),
            };
            if count != cycle + 1 {
                pending.push(edge.copy.id().to_string());
            }
        }
        Ok(pending)
    }

    fn reset(&self) -> Result<()> {
        for unit in &self.units {
            lock_unit(unit)?.reset();
        }
        for edge in &self.copies {
            edge.copy.reset();
        }
        Ok(())
    }
}

/// Owns unit metadata, the compiled graph and the worker pool.
pub struct UnitManager<T: Scalar> {
    config: EngineConfig,
    registry: StrategyRegistry<T>,
    metadata: Vec<UnitMetaData>,
    positions: HashMap<UnitId, usize>,
    loaders: HashMap<UnitId, DataLoader<T>>,
    graph: Option<Graph<T>>,
    pool: OnceCell<WorkerPool>,
    cancel: CancelToken,
    next_id: usize,
}

impl<T: Scalar> UnitManager<T> {
    pub fn new(config: EngineConfig, registry: StrategyRegistry<T>) -> Self {
        Self {
            config,
            registry,
            metadata: Vec::new(),
            positions: HashMap::new(),
            loaders: HashMap::new(),
            graph: None,
            pool: OnceCell::new(),
            cancel: CancelToken::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry<T> {
        &self.registry
    }

    /// Allocate a fresh, manager-unique id.
    pub fn new_unit_id(&mut self, unit_type: UnitType, name: &str) -> UnitId {
        let id = UnitId::new(unit_type, self.next_id, name);
        self.next_id += 1;
        id
    }

    pub fn append_unit(&mut self, meta: UnitMetaData) -> Result<UnitId> {
        if self.graph.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        if self.positions.contains_key(&meta.unit_id) {
            return Err(Error::DuplicateUnit(meta.unit_id));
        }
        let id = meta.unit_id.clone();
        self.next_id = self.next_id.max(id.id + 1);
        self.positions.insert(id.clone(), self.metadata.len());
        self.metadata.push(meta);
        crate::detail!("append {}", id);
        Ok(id)
    }

    /// Attach the data source of a placeholder unit.
    pub fn register_loader<F>(&mut self, unit: &UnitId, loader: F) -> Result<()>
    where
        F: Fn(usize, usize) -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
    {
        if self.graph.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        if !self.positions.contains_key(unit) {
            return Err(Error::UnknownUnit(unit.clone()));
        }
        self.loaders.insert(unit.clone(), Arc::new(loader));
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.graph.is_some()
    }

    /// Materialize every unit and wire copy units along each input edge.
    ///
    /// Validation runs before any tensor is allocated; the graph is installed
    /// only when every unit built successfully.
    pub fn compile(&mut self, optimizer: &str, optimizer_parameters: &Parameters) -> Result<()> {
        if self.graph.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        if self.config.batch_size == 0 {
            return Err(invalid_batch());
        }
        self.check_references()?;
        if !self.registry.has_optimizer(optimizer) {
            return Err(Error::UnknownStrategy {
                kind: "optimizer",
                name: optimizer.to_string(),
            });
        }
        let order = self.topological_order()?;
        let wired = self.wire()?;

        let mut units = Vec::with_capacity(order.len());
        let mut index = HashMap::new();
        for &pos in &order {
            let meta = &wired[pos];
            let trainable = !meta.internal_variable_shapes.is_empty();
            let ctx = BuildContext {
                registry: &self.registry,
                batch_size: self.config.batch_size,
                optimizer: if trainable {
                    Some(self.registry.optimizer(optimizer, optimizer_parameters)?)
                } else {
                    None
                },
                loader: self.loaders.get(&meta.unit_id).cloned(),
            };
            let unit = ComputableUnit::build(meta, ctx)?;
            index.insert(meta.unit_id.clone(), units.len());
            units.push(Arc::new(Mutex::new(unit)));
        }

        let mut copies = Vec::new();
        let mut outgoing = vec![Vec::new(); units.len()];
        let mut incoming = vec![Vec::new(); units.len()];
        for &pos in &order {
            let consumer = &wired[pos];
            for producer_id in consumer.input_units.values() {
                let producer = index[producer_id];
                let sole_reader = wired[self.positions[producer_id]].output_units.len() == 1;
                let copy = CopyUnit::new(
                    copies.len(),
                    producer_id.clone(),
                    consumer.unit_id.clone(),
                    sole_reader,
                );
                outgoing[producer].push(copies.len());
                incoming[index[&consumer.unit_id]].push(copies.len());
                copies.push(CopyEdge {
                    copy: Arc::new(copy),
                    producer,
                    consumer: index[&consumer.unit_id],
                });
            }
        }

        crate::trace!(
            "compile units={} copies={} optimizer={} batch={}",
            units.len(),
            copies.len(),
            optimizer,
            self.config.batch_size
        );
        self.metadata = wired;
        self.graph = Some(Graph {
            units,
            index,
            copies,
            outgoing,
            incoming,
        });
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        for meta in &self.metadata {
            let mut seen = HashSet::new();
            for (slot, input) in &meta.input_units {
                if !self.positions.contains_key(input) {
                    return Err(Error::DanglingReference {
                        unit: meta.unit_id.clone(),
                        input: slot.clone(),
                        missing: input.clone(),
                    });
                }
                if !seen.insert(input) {
                    return Err(Error::InvalidParameter {
                        name: slot.clone(),
                        reason: format!("{} is bound to more than one input slot of {}", input, meta.unit_id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over metadata positions; rejects cycles.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let count = self.metadata.len();
        let mut in_degree = vec![0usize; count];
        let mut consumers = vec![Vec::new(); count];
        for (pos, meta) in self.metadata.iter().enumerate() {
            for input in meta.input_units.values() {
                consumers[self.positions[input]].push(pos);
                in_degree[pos] += 1;
            }
        }
        let mut queue: VecDeque<usize> = (0..count).filter(|&pos| in_degree[pos] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(pos) = queue.pop_front() {
            order.push(pos);
            for &next in &consumers[pos] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        if order.len() != count {
            let stuck = (0..count)
                .filter(|&pos| in_degree[pos] > 0)
                .map(|pos| self.metadata[pos].unit_id.to_string())
                .collect();
            return Err(Error::CyclicGraph(stuck));
        }
        Ok(order)
    }

    /// Copy of the metadata with `output_units` filled in and every edge
    /// checked for matching shape and device.
    fn wire(&self) -> Result<Vec<UnitMetaData>> {
        let mut wired = self.metadata.clone();
        for meta in &mut wired {
            meta.output_units.clear();
        }
        for pos in 0..wired.len() {
            let inputs: Vec<(String, UnitId)> = wired[pos]
                .input_units
                .iter()
                .map(|(slot, id)| (slot.clone(), id.clone()))
                .collect();
            for (slot, producer_id) in inputs {
                let producer_pos = self.positions[&producer_id];
                let producer = &wired[producer_pos];
                let consumer = &wired[pos];
                let expected = consumer.input_shape(&slot)?;
                if *expected != producer.output_shape {
                    return Err(Error::shape(
                        format!("edge {} -> {}.{}", producer_id, consumer.unit_id, slot),
                        expected,
                        &producer.output_shape,
                    ));
                }
                if producer.device != consumer.device {
                    return Err(Error::DeviceMismatch {
                        src: producer.device,
                        dst: consumer.device,
                    });
                }
                let consumer_id = consumer.unit_id.clone();
                wired[producer_pos].output_units.push(consumer_id);
            }
        }
        Ok(wired)
    }

    fn graph(&self) -> Result<&Graph<T>> {
        self.graph.as_ref().ok_or(Error::NotCompiled)
    }

    fn pool(&self) -> Result<&WorkerPool> {
        self.pool
            .get_or_try_init(|| WorkerPool::new(self.config.worker_threads))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn check_interrupt(&self, cycle: usize, started: Instant) -> Result<()> {
        if self.cancel.is_cancelled() {
            crate::warning!("cycle {} cancelled", cycle);
            return Err(Error::Cancelled { cycle });
        }
        if let Some(deadline) = self.config.deadline {
            if started.elapsed() > deadline {
                crate::warning!("cycle {} exceeded deadline {:?}", cycle, deadline);
                return Err(Error::DeadlineExceeded { cycle });
            }
        }
        Ok(())
    }

    pub fn forward(&self, cycle: usize) -> Result<CycleReport> {
        self.run_sync(Direction::Forward, cycle)
    }

    pub fn backward(&self, cycle: usize) -> Result<CycleReport> {
        self.run_sync(Direction::Backward, cycle)
    }

    pub fn async_forward(&self, cycle: usize) -> Result<CycleReport> {
        self.run_async(Direction::Forward, cycle)
    }

    pub fn async_backward(&self, cycle: usize) -> Result<CycleReport> {
        self.run_async(Direction::Backward, cycle)
    }

    /// Single-threaded work-list sweep. Each executed unit immediately
    /// propagates through its own copies; a trailing scan over every copy
    /// picks up anything left. Cancellation and the deadline are checked
    /// before each piece of work, never once the pass has run dry.
    fn run_sync(&self, direction: Direction, cycle: usize) -> Result<CycleReport> {
        let graph = self.graph()?;
        let started = Instant::now();
        let mut report = CycleReport::new(direction, cycle);
        crate::trace!("{} cycle={} begin", direction, cycle);
        loop {
            let mut progressed = false;
            for idx in graph.scan_order(direction) {
                let executed = {
                    let mut unit = lock_unit(&graph.units[idx])?;
                    if unit.is_ready(direction, cycle) {
                        self.check_interrupt(cycle, started)?;
                        unit.run(direction, cycle)?;
                        crate::detail!("{} {} cycle={}", direction, unit.id(), cycle);
                        true
                    } else {
                        false
                    }
                };
                if !executed {
                    continue;
                }
                report.executed += 1;
                progressed = true;
                for &edge in graph.copies_of(idx, direction) {
                    if self.sync_copy(graph, edge, direction, cycle, started)? {
                        report.copies += 1;
                    }
                }
            }
            for edge in 0..graph.copies.len() {
                if self.sync_copy(graph, edge, direction, cycle, started)? {
                    report.copies += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
            report.polls += 1;
        }
        self.finish(graph, report)
    }

    fn sync_copy(
        &self,
        graph: &Graph<T>,
        edge: usize,
        direction: Direction,
        cycle: usize,
        started: Instant,
    ) -> Result<bool> {
        if !graph.copy_ready(edge, direction, cycle)? {
            return Ok(false);
        }
        self.check_interrupt(cycle, started)?;
        graph.try_copy(edge, direction, cycle)
    }

    /// Wave-based dispatch: snapshot every ready unit and copy, submit them
    /// all, join the whole wave, then rescan.
    fn run_async(&self, direction: Direction, cycle: usize) -> Result<CycleReport> {
        let graph = self.graph()?;
        let pool = self.pool()?;
        let started = Instant::now();
        let mut report = CycleReport::new(direction, cycle);
        crate::trace!(
            "async {} cycle={} begin threads={}",
            direction,
            cycle,
            pool.threads()
        );
        loop {
            let mut ready_units = Vec::new();
            for idx in graph.scan_order(direction) {
                if lock_unit(&graph.units[idx])?.is_ready(direction, cycle) {
                    ready_units.push(idx);
                }
            }
            let mut ready_copies = Vec::new();
            for edge in 0..graph.copies.len() {
                if graph.copy_ready(edge, direction, cycle)? {
                    ready_copies.push(edge);
                }
            }
            if ready_units.is_empty() && ready_copies.is_empty() {
                break;
            }
            report.polls += 1;

            let mut completions: Vec<Completion<()>> = Vec::new();
            let mut interrupted = None;
            for &idx in &ready_units {
                if let Err(err) = self.check_interrupt(cycle, started) {
                    interrupted = Some(err);
                    break;
                }
                let unit = &graph.units[idx];
                let submitted = match direction {
                    Direction::Forward => ComputableUnit::async_forward(unit, pool, cycle),
                    Direction::Backward => ComputableUnit::async_backward(unit, pool, cycle),
                };
                match submitted {
                    Ok(completion) => completions.push(completion),
                    Err(err) => {
                        interrupted = Some(err);
                        break;
                    }
                }
            }
            let units_submitted = completions.len();
            if interrupted.is_none() {
                for &edge in &ready_copies {
                    if let Err(err) = self.check_interrupt(cycle, started) {
                        interrupted = Some(err);
                        break;
                    }
                    let copy = &graph.copies[edge];
                    completions.push(CopyUnit::submit(
                        &copy.copy,
                        &graph.units[copy.producer],
                        &graph.units[copy.consumer],
                        pool,
                        direction,
                        cycle,
                    ));
                }
            }
            let copies_submitted = completions.len() - units_submitted;
            // Drain before reporting anything so no task outlives the call.
            let joined = join_all(completions);
            if let Some(err) = interrupted {
                crate::fault!("async {} cycle={} interrupted: {}", direction, cycle, err);
                return Err(err);
            }
            if let Err(err) = joined {
                crate::fault!("async {} cycle={} failed: {}", direction, cycle, err);
                return Err(err);
            }
            report.executed += units_submitted;
            report.copies += copies_submitted;
        }
        self.finish(graph, report)
    }

    fn finish(&self, graph: &Graph<T>, report: CycleReport) -> Result<CycleReport> {
        let pending = graph.pending(report.direction, report.cycle)?;
        if !pending.is_empty() {
            crate::fault!(
                "{} cycle={} stalled, pending={:?}",
                report.direction,
                report.cycle,
                pending
            );
            return Err(Error::Stalled {
                cycle: report.cycle,
                pending,
            });
        }
        crate::trace!(
            "{} cycle={} done executed={} copies={} polls={}",
            report.direction,
            report.cycle,
            report.executed,
            report.copies,
            report.polls
        );
        Ok(report)
    }

    pub fn get_unit_output_shape(&self, unit: &UnitId) -> Result<Shape> {
        Ok(self.metadata(unit)?.output_shape.clone())
    }

    pub fn metadata(&self, unit: &UnitId) -> Result<&UnitMetaData> {
        self.positions
            .get(unit)
            .map(|&pos| &self.metadata[pos])
            .ok_or_else(|| Error::UnknownUnit(unit.clone()))
    }

    /// Ids in append order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.metadata.iter().map(|meta| meta.unit_id.clone()).collect()
    }

    pub fn copy_unit_count(&self) -> usize {
        self.graph.as_ref().map_or(0, |graph| graph.copies.len())
    }

    /// Zero every state counter so a fresh run can start at cycle 0.
    pub fn reset(&self) -> Result<()> {
        self.graph()?.reset()?;
        crate::trace!("reset");
        Ok(())
    }

    /// Reallocate every I/O tensor for `batch_size` samples. Contents are
    /// discarded and all states reset; weights are kept.
    pub fn change_batch_size(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(invalid_batch());
        }
        self.config.batch_size = batch_size;
        if let Some(graph) = &self.graph {
            for unit in &graph.units {
                lock_unit(unit)?.change_batch_size(batch_size);
            }
            for edge in &graph.copies {
                edge.copy.reset();
            }
        }
        crate::trace!("batch size -> {}", batch_size);
        Ok(())
    }

    pub fn is_ready(&self, unit: &UnitId, direction: Direction, cycle: usize) -> Result<bool> {
        Ok(lock_unit(self.graph()?.unit(unit)?)?.is_ready(direction, cycle))
    }

    pub fn unit_state(&self, unit: &UnitId) -> Result<StateSnapshot> {
        Ok(lock_unit(self.graph()?.unit(unit)?)?.state().snapshot())
    }

    /// Copy of the unit's latest forward output. When the buffer was handed
    /// to its consumer, the consumer's input slot is read instead.
    pub fn unit_output(&self, unit: &UnitId) -> Result<Tensor<T>> {
        let graph = self.graph()?;
        {
            let guard = lock_unit(graph.unit(unit)?)?;
            if guard.tensors().forward_output.is_owned() {
                return guard.tensors().forward_output.duplicate();
            }
        }
        for consumer in &self.metadata(unit)?.output_units {
            let guard = lock_unit(graph.unit(consumer)?)?;
            if let Some(tensor) = guard.tensors().forward_inputs.get(unit) {
                if tensor.is_owned() {
                    return tensor.duplicate();
                }
            }
        }
        Err(Error::OwnershipViolation(format!("forward output of {}", unit)))
    }

    /// Copy of the gradient `unit` computed for its input `towards`.
    pub fn unit_backward_output(&self, unit: &UnitId, towards: &UnitId) -> Result<Tensor<T>> {
        let graph = self.graph()?;
        {
            let guard = lock_unit(graph.unit(unit)?)?;
            let tensor = guard
                .tensors()
                .backward_outputs
                .get(towards)
                .ok_or_else(|| Error::UnknownUnit(towards.clone()))?;
            if tensor.is_owned() {
                return tensor.duplicate();
            }
        }
        let guard = lock_unit(graph.unit(towards)?)?;
        let tensor = guard
            .tensors()
            .backward_inputs
            .get(unit)
            .ok_or_else(|| Error::UnknownUnit(unit.clone()))?;
        tensor.duplicate()
    }

    /// Copy of a unit-local tensor such as `weight` or `bias`.
    pub fn internal_tensor(&self, unit: &UnitId, name: &str) -> Result<Tensor<T>> {
        let guard = lock_unit(self.graph()?.unit(unit)?)?;
        let tensor = guard
            .tensors()
            .internal
            .get(name)
            .ok_or_else(|| Error::MissingInput {
                unit: unit.clone(),
                what: "internal variable",
                name: name.to_string(),
            })?;
        tensor.duplicate()
    }
}

fn invalid_batch() -> Error {
    Error::InvalidParameter {
        name: "batch_size".to_string(),
        reason: "must be at least 1".to_string(),
    }
}
