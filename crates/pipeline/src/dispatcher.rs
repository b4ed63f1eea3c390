//! Dispatcher - bounded-concurrency worker pool for pooled byte buffers
//!
//! The `Dispatcher` accepts jobs (pooled buffers) on a bounded FIFO queue and
//! hands each one to exactly one idle worker, which invokes the user handler
//! and releases the buffer back to its pool.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────── idle-worker registry ◄───────┐
//!                         │       (bounded, capacity W)          │ advertise slot
//!                         ▼                                      │
//! submit_job ──► job queue (B) ──► dispatch task ──► slot ──► worker ──► handler
//!                                                                 │
//!                                                                 └──► buffer back to pool
//! ```
//!
//! # Key Design
//!
//! - **Idle registry**: each idle worker advertises a fresh single-slot channel;
//!   the dispatch task pairs the next idle slot with the next queued job, so a
//!   job waits in the queue until a worker is demonstrably free
//! - **Bounded in-flight work**: at most W handlers run at once, jobs are
//!   dispatched in FIFO order
//! - **Backpressure**: `submit_job` suspends while the queue is full; with a
//!   queue size of zero it waits until a worker has taken the job
//! - **Scoped release**: the worker owns the [`PooledBuffer`] while the handler
//!   runs, so the buffer is returned even if the handler panics
//! - **Drain on stop**: `stop` closes the queue, the dispatch task hands every
//!   job already accepted to a worker, then exits; workers terminate when their
//!   slot is closed
//!
//! # Example
//!
//! ```ignore
//! let pool = Arc::new(BufferPool::prefilled(100, 1024));
//! let dispatcher = Dispatcher::new(4, 100, |bytes: &[u8]| consume(bytes), Arc::clone(&pool))?;
//! dispatcher.run()?;
//!
//! let mut buf = pool.get_pooled();
//! buf.extend_from_slice(b"payload");
//! dispatcher.submit_job(buf).await?;
//!
//! dispatcher.stop().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::error::{PipelineError, Result};
use crate::handler::BytesHandler;
use crate::metrics::DispatcherMetrics;

/// A worker's private single-slot job channel, as advertised on the registry
type Slot = oneshot::Sender<PooledBuffer>;

/// A job traversing the queue
struct Job {
    buf: PooledBuffer,
    /// Rendezvous confirmation, set only when the queue size is zero
    delivered: Option<oneshot::Sender<()>>,
}

/// Dispatches pooled buffers to a fixed set of workers
pub struct Dispatcher {
    /// Number of workers (W)
    workers: usize,

    /// Job queue capacity (B)
    queue_size: usize,

    handler: Arc<dyn BytesHandler>,

    pool: Arc<BufferPool>,

    job_tx: mpsc::Sender<Job>,

    /// Taken by `run`; `None` afterwards
    job_rx: Mutex<Option<mpsc::Receiver<Job>>>,

    /// One-shot stop signal, observed by the dispatch task and never cleared
    shutdown: CancellationToken,

    /// Tracks the workers and the dispatch task (the completion counter)
    tracker: TaskTracker,

    metrics: Arc<DispatcherMetrics>,
}

impl Dispatcher {
    /// Create a dispatcher
    ///
    /// Creates the job queue but does not start any workers; call [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns `InvalidWorkerCount` if `workers` is zero.
    pub fn new<H: BytesHandler>(
        workers: usize,
        queue_size: usize,
        handler: H,
        pool: Arc<BufferPool>,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(PipelineError::InvalidWorkerCount);
        }

        // tokio channels need a non-zero capacity; a zero-sized queue is
        // emulated with a one-slot channel plus a delivery confirmation.
        let (job_tx, job_rx) = mpsc::channel(queue_size.max(1));

        Ok(Self {
            workers,
            queue_size,
            handler: Arc::new(handler),
            pool,
            job_tx,
            job_rx: Mutex::new(Some(job_rx)),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            metrics: Arc::new(DispatcherMetrics::new()),
        })
    }

    /// Share an externally owned metrics instance
    ///
    /// Lets callers hold a metrics handle before the dispatcher exists.
    pub fn with_metrics(mut self, metrics: Arc<DispatcherMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Start the workers and the dispatch task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` on a second call.
    pub fn run(&self) -> Result<()> {
        let job_rx = self
            .job_rx
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyRunning)?;

        let (registry_tx, registry_rx) = mpsc::channel::<Slot>(self.workers);

        for id in 0..self.workers {
            let worker = Worker {
                id,
                registry: registry_tx.clone(),
                handler: Arc::clone(&self.handler),
                metrics: Arc::clone(&self.metrics),
            };

            self.metrics.worker_started();
            self.tracker.spawn(worker.run());
        }

        // Workers hold the only senders: the registry closes once they are all gone
        drop(registry_tx);

        self.tracker.spawn(dispatch(
            job_rx,
            registry_rx,
            self.shutdown.clone(),
            Arc::clone(&self.metrics),
        ));
        self.tracker.close();

        tracing::info!(
            workers = self.workers,
            queue_size = self.queue_size,
            "dispatcher started"
        );

        Ok(())
    }

    /// Submit a buffer to be handled
    ///
    /// Suspends while the queue is full. Returns once the job has been accepted
    /// into the queue (or, with a queue size of zero, once a worker has taken it),
    /// not once it has been handled.
    ///
    /// # Errors
    ///
    /// Returns `ShuttingDown` once `stop` has been called. The buffer is
    /// released back to its pool.
    pub async fn submit_job(&self, job: PooledBuffer) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(PipelineError::ShuttingDown);
        }

        let (delivered, confirmation) = if self.queue_size == 0 {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        self.job_tx
            .send(Job {
                buf: job,
                delivered,
            })
            .await
            .map_err(|_| PipelineError::ShuttingDown)?;
        self.metrics.job_submitted();

        if let Some(confirmation) = confirmation {
            confirmation
                .await
                .map_err(|_| PipelineError::ShuttingDown)?;
        }

        Ok(())
    }

    /// Stop the dispatcher
    ///
    /// Jobs already accepted are still handled. Returns once every worker and
    /// the dispatch task have terminated.
    pub async fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!(workers = self.workers, "dispatcher stopping");
        }
        self.shutdown.cancel();
        self.wait().await;
    }

    /// Wait for all workers to terminate
    ///
    /// Returns immediately if the dispatcher was never started.
    pub async fn wait(&self) {
        // The tracker is closed by `run`; an open tracker means nothing was spawned
        if !self.tracker.is_closed() {
            return;
        }
        self.tracker.wait().await;
    }

    /// Check if `stop` has been requested
    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of workers
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Job queue capacity
    #[inline]
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Pool that receivers should draw buffers from
    #[inline]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.workers)
            .field("queue_size", &self.queue_size)
            .field("stopping", &self.shutdown.is_cancelled())
            .field("pool", &self.pool)
            .finish()
    }
}

// =============================================================================
// Dispatch loop
// =============================================================================

/// Pair idle workers with queued jobs until the queue is closed and empty
async fn dispatch(
    mut jobs: mpsc::Receiver<Job>,
    mut registry: mpsc::Receiver<Slot>,
    shutdown: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
) {
    let mut pending: Option<Job> = None;
    let mut draining = false;

    loop {
        // 1. Find an idle worker
        let Some(slot) = registry.recv().await else {
            break;
        };

        // 2. Get a job
        let job = match pending.take() {
            Some(job) => job,
            None => {
                let next = tokio::select! {
                    biased;

                    job = jobs.recv() => job,

                    _ = shutdown.cancelled(), if !draining => {
                        // Refuse new jobs, keep handing out the ones already queued
                        draining = true;
                        jobs.close();
                        jobs.recv().await
                    }
                };

                match next {
                    Some(job) => job,
                    None => break,
                }
            }
        };

        // 3. Send it to the worker
        let Job { buf, delivered } = job;
        match slot.send(buf) {
            Ok(()) => {
                metrics.job_dispatched();
                if let Some(delivered) = delivered {
                    let _ = delivered.send(());
                }
            }
            // Worker vanished between advertising and delivery; try the next one
            Err(buf) => pending = Some(Job { buf, delivered }),
        }
    }

    if let Some(job) = pending {
        tracing::warn!("no workers left, releasing undelivered job");
        drop(job);
    }

    tracing::debug!("dispatch loop stopped");
    // Dropping `registry` closes every advertised slot, which stops idle workers
}

// =============================================================================
// Worker
// =============================================================================

/// Long-lived worker: advertise, wait for a job, handle it, repeat
struct Worker {
    id: usize,
    registry: mpsc::Sender<Slot>,
    handler: Arc<dyn BytesHandler>,
    metrics: Arc<DispatcherMetrics>,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker_id = self.id, "dispatcher worker started");

        loop {
            // Register this worker as idle
            let (slot, job) = oneshot::channel();
            if self.registry.send(slot).await.is_err() {
                break;
            }

            // A closed slot means the dispatcher has stopped
            let Ok(buf) = job.await else {
                break;
            };

            self.handle(buf).await;
        }

        self.metrics.worker_stopped();
        tracing::debug!(worker_id = self.id, "dispatcher worker stopped");
    }

    async fn handle(&self, buf: PooledBuffer) {
        self.metrics.job_started();

        let handler = Arc::clone(&self.handler);
        let result = tokio::task::spawn_blocking(move || {
            handler.handle_bytes(&buf);
            // `buf` is released to its pool here, or while unwinding on panic
        })
        .await;

        if let Err(e) = result {
            if e.is_panic() {
                self.metrics.handler_panicked();
                tracing::warn!(worker_id = self.id, "bytes handler panicked");
            } else {
                tracing::debug!(worker_id = self.id, error = %e, "bytes handler cancelled");
            }
        }

        self.metrics.job_completed();
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;
