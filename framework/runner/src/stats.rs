use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use conductor_load_summary_model::IterationCounts;

/// Counters shared between the scheduler and the agents.
#[derive(Debug, Default)]
pub struct RunStats {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    interrupted: AtomicU64,
    dropped: AtomicU64,
    agents_started: AtomicUsize,
    agents_alive: AtomicUsize,
}

impl RunStats {
    pub(crate) fn iteration_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn iteration_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn iteration_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn iteration_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn iteration_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn agent_started(&self) {
        self.agents_started.fetch_add(1, Ordering::Relaxed);
        self.agents_alive.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn agent_stopped(&self) {
        self.agents_alive.fetch_sub(1, Ordering::AcqRel);
    }

    /// Total number of agents started during the run.
    pub fn agents_started(&self) -> usize {
        self.agents_started.load(Ordering::Relaxed)
    }

    /// Agents whose thread has not exited yet.
    pub fn agents_alive(&self) -> usize {
        self.agents_alive.load(Ordering::Acquire)
    }

    pub fn iterations(&self) -> IterationCounts {
        IterationCounts {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
