//! Error taxonomy for graph construction and execution.
//!
//! Construction-time errors (`ShapeMismatch`, `DanglingReference`,
//! `UnknownStrategy`) abort `compile`. Execution errors stop the whole cycle.
use thiserror::Error;

use crate::tensor::{Device, Shape};
use crate::unit::UnitId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: String,
        got: String,
    },

    #[error("invalid shape {0:?}: dimensions must be non-zero")]
    InvalidShape(Vec<usize>),

    #[error("unit {unit} references input '{input}' ({missing}) which was never appended")]
    DanglingReference {
        unit: UnitId,
        input: String,
        missing: UnitId,
    },

    #[error("unknown {kind} strategy '{name}'")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("tensor buffer was forwarded away: {0}")]
    OwnershipViolation(String),

    #[error("device mismatch: {src:?} vs {dst:?}")]
    DeviceMismatch { src: Device, dst: Device },

    #[error("unit {0} was already appended")]
    DuplicateUnit(UnitId),

    #[error("index out of bounds: batch {batch} index {index} (batch size {batch_size}, sample size {size})")]
    IndexOutOfBounds {
        batch: usize,
        index: usize,
        batch_size: usize,
        size: usize,
    },

    #[error("unit {unit} is missing required {what} '{name}'")]
    MissingInput {
        unit: UnitId,
        what: &'static str,
        name: String,
    },

    #[error("placeholder {0} has no registered data loader")]
    MissingLoader(UnitId),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("graph contains a cycle through {0:?}")]
    CyclicGraph(Vec<String>),

    #[error("{unit} is not ready for cycle {cycle}")]
    NotReady { unit: String, cycle: usize },

    #[error("graph is not compiled")]
    NotCompiled,

    #[error("graph is already compiled")]
    AlreadyCompiled,

    #[error("cycle {cycle} stalled with pending units: {pending:?}")]
    Stalled { cycle: usize, pending: Vec<String> },

    #[error("cycle {cycle} was cancelled")]
    Cancelled { cycle: usize },

    #[error("cycle {cycle} exceeded its deadline")]
    DeadlineExceeded { cycle: usize },

    #[error("worker task exited without reporting completion")]
    TaskLost,

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("worker pool error: {0}")]
    Worker(String),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(context: impl Into<String>, expected: &Shape, got: &Shape) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub(crate) fn values(context: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: format!("{} values", expected),
            got: format!("{} values", got),
        }
    }
}
