//! flowd - Pipeline
//!
//! Byte-buffer pool and bounded-concurrency dispatcher that sit between a
//! datagram receiver and the code that decodes it.
//!
//! # Architecture
//!
//! ```text
//!   UDP socket ──► BufferPool::get_pooled ──► Dispatcher::submit_job
//!                                                   │
//!                          ┌────────────────────────┼────────────────────────┐
//!                          ▼                        ▼                        ▼
//!                      worker 0                 worker 1      ...       worker W-1
//!                          │                        │                        │
//!                   BytesHandler            BytesHandler             BytesHandler
//!                          │                        │                        │
//!                          └──────── buffer back to BufferPool on drop ──────┘
//! ```
//!
//! # Key Design
//!
//! - **Lock-free pool**: `crossbeam::queue::ArrayQueue` of `BytesMut`, get and
//!   put never block
//! - **Bounded concurrency**: exactly W workers, FIFO dispatch
//! - **Backpressure**: a bounded job queue suspends the receiver when full
//! - **Guaranteed release**: [`PooledBuffer`] returns to its pool on drop
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use flowd_pipeline::{BufferPool, Dispatcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> flowd_pipeline::Result<()> {
//! let pool = Arc::new(BufferPool::prefilled(8, 64));
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&total);
//! let dispatcher = Dispatcher::new(
//!     2,
//!     8,
//!     move |bytes: &[u8]| {
//!         counter.fetch_add(bytes.len(), Ordering::Relaxed);
//!     },
//!     Arc::clone(&pool),
//! )?;
//! dispatcher.run()?;
//!
//! let mut buf = pool.get_pooled();
//! buf.extend_from_slice(b"datagram");
//! dispatcher.submit_job(buf).await?;
//!
//! dispatcher.stop().await;
//! assert_eq!(total.load(Ordering::Relaxed), 8);
//! # Ok(())
//! # }
//! ```

mod buffer_pool;
mod dispatcher;
mod error;
mod handler;
mod metrics;

pub use buffer_pool::{BufferPool, BufferPoolMetrics, BufferPoolSnapshot, PooledBuffer};
pub use dispatcher::Dispatcher;
pub use error::{PipelineError, Result};
pub use handler::BytesHandler;
pub use metrics::{DispatcherMetrics, DispatcherSnapshot};

/// Default number of jobs the dispatcher queue holds before `submit_job` blocks
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Default capacity of each pooled buffer, large enough for any NetFlow v5 datagram
pub const DEFAULT_BUFFER_CAPACITY: usize = 2048;
