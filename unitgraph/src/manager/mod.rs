//! Unit manager and the worker pool behind async cycles.
#[allow(clippy::module_inception)]
mod manager;
mod scheduler;

pub use manager::{CycleReport, Direction, UnitManager};
pub use scheduler::{join_all, CancelToken, Completion, WorkerPool};
