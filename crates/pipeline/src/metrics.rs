//! Dispatcher metrics
//!
//! Atomic counters for tracking dispatcher throughput and worker occupancy.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the dispatcher and its workers
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Jobs accepted into the queue
    jobs_submitted: AtomicU64,

    /// Jobs handed to an idle worker
    jobs_dispatched: AtomicU64,

    /// Jobs whose handler returned (or panicked) and whose buffer was released
    jobs_completed: AtomicU64,

    /// Handler invocations that panicked
    handler_panics: AtomicU64,

    /// Workers currently alive
    workers_active: AtomicU64,

    /// Workers currently running a handler
    workers_busy: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            jobs_submitted: AtomicU64::new(0),
            jobs_dispatched: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            workers_active: AtomicU64::new(0),
            workers_busy: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn job_dispatched(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker picking up a job
    #[inline]
    pub fn job_started(&self) {
        self.workers_busy.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker finishing a job
    #[inline]
    pub fn job_completed(&self) {
        self.workers_busy.fetch_sub(1, Ordering::Relaxed);
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn handler_panicked(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_started(&self) {
        self.workers_active.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_stopped(&self) {
        self.workers_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            workers_active: self.workers_active.load(Ordering::Relaxed),
            workers_busy: self.workers_busy.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of dispatcher metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherSnapshot {
    pub jobs_submitted: u64,
    pub jobs_dispatched: u64,
    pub jobs_completed: u64,
    pub handler_panics: u64,
    pub workers_active: u64,
    pub workers_busy: u64,
}

impl DispatcherSnapshot {
    /// Jobs accepted but not yet handed to a worker
    #[inline]
    pub fn queued(&self) -> u64 {
        self.jobs_submitted.saturating_sub(self.jobs_dispatched)
    }
}
