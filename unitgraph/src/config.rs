use std::time::Duration;

/// In-process engine settings handed to `UnitManager::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Samples per cycle; every I/O tensor is allocated for this many.
    pub batch_size: usize,
    /// Worker threads for async cycles. `None` uses rayon's default.
    pub worker_threads: Option<usize>,
    /// Upper bound on the wall time of one driver pass.
    pub deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            worker_threads: None,
            deadline: None,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
