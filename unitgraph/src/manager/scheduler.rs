//! Worker pool and completion handles for async cycles.
//!
//! Each submitted task owns the sending half of a one-shot channel; the
//! receiving half is the task's [`Completion`]. A panicking task drops its
//! sender, which the waiter observes as [`Error::TaskLost`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new()
            .thread_name(|index| format!("unitgraph-worker-{}", index))
            .panic_handler(|_| crate::critical!("worker task panicked"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| Error::Worker(format!("failed to build worker pool: {}", err)))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` on the pool; the result arrives through the returned handle.
    pub fn submit<R, F>(&self, label: String, task: F) -> Completion<R>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            crate::detail!(
                "task.start {} thread={:?}",
                label,
                std::thread::current().id()
            );
            let result = task();
            crate::detail!(
                "task.end {} thread={:?} ok={}",
                label,
                std::thread::current().id(),
                result.is_ok()
            );
            let _ = tx.send(result);
        });
        Completion { rx }
    }
}

/// One-shot handle to a submitted task's result.
#[must_use = "a completion must be waited on before its tensors are reused"]
pub struct Completion<R> {
    rx: Receiver<Result<R>>,
}

impl<R> Completion<R> {
    /// Block until the task reports.
    pub fn wait(self) -> Result<R> {
        self.rx.recv().map_err(|_| Error::TaskLost)?
    }
}

/// Wait for every completion, then surface the first failure in submission
/// order. Never returns before all tasks have reported.
pub fn join_all<R>(completions: Vec<Completion<R>>) -> Result<Vec<R>> {
    let results: Vec<Result<R>> = completions.into_iter().map(Completion::wait).collect();
    results.into_iter().collect()
}

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
