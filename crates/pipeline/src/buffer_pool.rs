//! Lock-free byte buffer pool for the datagram hot path
//!
//! Provides fixed-capacity `BytesMut` buffers so the receive loop can read one
//! datagram per buffer without allocating per packet. Uses a lock-free queue
//! for O(1) get/put operations.
//!
//! # Semantics
//!
//! - **Get never blocks**: an empty pool allocates a fresh buffer
//! - **Put never blocks**: a full pool drops the returned buffer
//! - **Scoped release**: [`PooledBuffer`] returns its buffer on `Drop`, including
//!   while unwinding from a panicking handler
//!
//! The pool bounds allocator pressure, not concurrency. Over-allocation under a
//! burst is acceptable; stalling the receiver is not.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flowd_pipeline::BufferPool;
//!
//! let pool = Arc::new(BufferPool::new(100, 2048));
//! pool.fill(100);
//!
//! // Hot path - get a guarded buffer, it goes back to the pool when dropped
//! let mut buf = pool.get_pooled();
//! buf.extend_from_slice(b"datagram");
//! drop(buf);
//!
//! assert_eq!(pool.available(), 100);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;

/// Lock-free pool of reusable `BytesMut` buffers
///
/// Holds at most `capacity()` idle buffers, each with at least
/// `buffer_capacity()` bytes of capacity.
pub struct BufferPool {
    /// Lock-free queue of available buffers
    queue: ArrayQueue<BytesMut>,

    /// Capacity for each buffer
    buffer_capacity: usize,

    /// Metrics
    metrics: BufferPoolMetrics,
}

/// Metrics for buffer pool monitoring
///
/// After quiescence `hits + misses == returns + drops`: every buffer handed out
/// came back exactly once.
#[derive(Debug, Default)]
pub struct BufferPoolMetrics {
    /// Number of successful pool hits (buffer reused)
    pub hits: AtomicU64,

    /// Number of pool misses (new allocation required)
    pub misses: AtomicU64,

    /// Number of buffers returned to pool
    pub returns: AtomicU64,

    /// Number of buffers dropped (pool was full or buffer too small)
    pub drops: AtomicU64,
}

impl BufferPoolMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    /// Record a pool hit
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pool miss
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer return
    #[inline]
    pub fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer drop (pool full)
    #[inline]
    pub fn record_drop(&self) {
        self.drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> BufferPoolSnapshot {
        BufferPoolSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }

    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }
}

/// Point-in-time snapshot of buffer pool metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

impl BufferPoolSnapshot {
    /// Calculate hit rate from snapshot
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Buffers handed out by `get`
    #[inline]
    pub fn taken(&self) -> u64 {
        self.hits + self.misses
    }

    /// Buffers handed back through `put`
    #[inline]
    pub fn given_back(&self) -> u64 {
        self.returns + self.drops
    }

    /// Buffers currently owned by callers
    #[inline]
    pub fn outstanding(&self) -> u64 {
        self.taken().saturating_sub(self.given_back())
    }
}

impl BufferPool {
    /// Create an empty buffer pool
    ///
    /// # Arguments
    ///
    /// * `pool_size` - Maximum number of idle buffers retained (zero is treated as one)
    /// * `buffer_capacity` - Capacity of each buffer in bytes
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(pool_size.max(1)),
            buffer_capacity,
            metrics: BufferPoolMetrics::new(),
        }
    }

    /// Create a pool with every slot pre-allocated
    pub fn prefilled(pool_size: usize, buffer_capacity: usize) -> Self {
        let pool = Self::new(pool_size, buffer_capacity);
        pool.fill(pool_size);
        pool
    }

    /// Pre-allocate up to `count` buffers, bounded by the remaining room
    ///
    /// Returns the number of buffers actually inserted.
    pub fn fill(&self, count: usize) -> usize {
        let room = self.queue.capacity() - self.queue.len();
        let mut inserted = 0;

        for _ in 0..count.min(room) {
            if self
                .queue
                .push(BytesMut::with_capacity(self.buffer_capacity))
                .is_err()
            {
                break;
            }
            inserted += 1;
        }

        inserted
    }

    /// Get a buffer from the pool
    ///
    /// Returns a pooled buffer if available, otherwise allocates a new one.
    /// The buffer is empty and has at least `buffer_capacity()` bytes of room.
    #[inline]
    pub fn get(&self) -> BytesMut {
        match self.queue.pop() {
            Some(buf) => {
                self.metrics.record_hit();
                buf
            }
            None => {
                self.metrics.record_miss();
                BytesMut::with_capacity(self.buffer_capacity)
            }
        }
    }

    /// Get a buffer wrapped in a guard that returns it to this pool on drop
    #[inline]
    pub fn get_pooled(self: &Arc<Self>) -> PooledBuffer {
        PooledBuffer {
            buf: self.get(),
            pool: Arc::clone(self),
        }
    }

    /// Return a buffer to the pool
    ///
    /// Clears the buffer and returns it to the pool if space is available.
    /// If the pool is full the buffer is dropped. Buffers that did not come
    /// from this pool are accepted on the same terms.
    #[inline]
    pub fn put(&self, mut buf: BytesMut) {
        buf.clear();

        // Only keep buffers that can still hold a full datagram
        if buf.capacity() >= self.buffer_capacity {
            match self.queue.push(buf) {
                Ok(()) => self.metrics.record_return(),
                Err(_) => self.metrics.record_drop(),
            }
        } else {
            self.metrics.record_drop();
        }
    }

    /// Get the number of buffers currently available in the pool
    #[inline]
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Get the pool capacity (maximum number of idle buffers)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Get the buffer capacity (size of each buffer)
    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &BufferPoolMetrics {
        &self.metrics
    }

    /// Check if the pool is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if the pool is full
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`]
///
/// Dereferences to `BytesMut`. Dropping the guard hands the buffer back to the
/// pool it came from, so ownership is released on every exit path.
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// The pool this buffer returns to
    #[inline]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    #[inline]
    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_pool_test.rs"]
mod buffer_pool_test;
