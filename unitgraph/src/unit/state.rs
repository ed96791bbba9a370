use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-unit execution counters, bumped once per completed pass.
#[derive(Debug, Default)]
pub struct UnitState {
    forward: AtomicUsize,
    backward: AtomicUsize,
}

impl UnitState {
    pub fn forward_count(&self) -> usize {
        self.forward.load(Ordering::Acquire)
    }

    pub fn backward_count(&self) -> usize {
        self.backward.load(Ordering::Acquire)
    }

    pub(crate) fn increment_forward(&self) -> usize {
        self.forward.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn increment_backward(&self) -> usize {
        self.backward.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset(&self) {
        self.forward.store(0, Ordering::Release);
        self.backward.store(0, Ordering::Release);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            forward: self.forward_count(),
            backward: self.backward_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub forward: usize,
    pub backward: usize,
}
