//! NetFlow v5 UDP Processor
//!
//! Receives NetFlow v5 export datagrams over UDP and fans them out to a
//! bounded worker pool for decoding.
//!
//! # Design
//!
//! A single receive task owns the socket:
//! - take a buffer from the pool
//! - read one datagram into it
//! - submit it to the dispatcher (suspends while the job queue is full)
//!
//! Decoding and the user's flow handler run on the dispatcher workers, so a
//! slow handler applies backpressure to the receive loop instead of growing
//! an unbounded queue. The kernel socket buffer absorbs bursts in the meantime.
//!
//! # Example
//!
//! ```ignore
//! let config = NetflowProcessorConfig {
//!     address: "0.0.0.0:2055".into(),
//!     num_workers: 8,
//!     ..Default::default()
//! };
//!
//! let processor = Arc::new(Processor::builder(config).handler(my_handler).build()?);
//! let runner = tokio::spawn({
//!     let processor = Arc::clone(&processor);
//!     async move { processor.run().await }
//! });
//!
//! tokio::signal::ctrl_c().await?;
//! processor.stop_and_wait().await;
//! runner.await??;
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flowd_pipeline::{
    BufferPool, BufferPoolSnapshot, DEFAULT_BUFFER_CAPACITY, DEFAULT_QUEUE_SIZE, Dispatcher,
    DispatcherMetrics, DispatcherSnapshot, PipelineError,
};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::handler::{FlowsHandler, NetflowBytesHandler};

// =============================================================================
// Constants
// =============================================================================

/// Default NetFlow listen address
const DEFAULT_ADDRESS: &str = "127.0.0.1:2055";


// =============================================================================
// Configuration
// =============================================================================

/// NetFlow processor configuration
///
/// Zero values select a default when the processor is built; see
/// [`normalized`](Self::normalized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetflowProcessorConfig {
    /// Source identifier for logs and metrics
    pub id: String,

    /// UDP bind address (e.g., "0.0.0.0:2055")
    pub address: String,

    /// Number of dispatcher workers (0 = host parallelism)
    pub num_workers: usize,

    /// Dispatcher job queue size (0 = 100)
    pub backlog: usize,

    /// Capacity of each pooled buffer in bytes (0 = 2048)
    pub packet_size: usize,

    /// Number of idle buffers the pool retains (0 = backlog)
    pub pool_size: usize,

    /// Requested kernel receive buffer (SO_RCVBUF), `None` keeps the OS default
    pub recv_buffer_size: Option<usize>,

    /// Allocate every pool buffer up front
    pub prefill_pool: bool,
}

impl Default for NetflowProcessorConfig {
    fn default() -> Self {
        Self {
            id: "netflow".into(),
            address: DEFAULT_ADDRESS.into(),
            num_workers: 0,
            backlog: 0,
            packet_size: 0,
            pool_size: 0,
            recv_buffer_size: None,
            prefill_pool: true,
        }
    }
}

impl NetflowProcessorConfig {
    /// Create config with a custom bind address
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Replace zero values with their defaults
    pub fn normalized(mut self) -> Self {
        if self.num_workers == 0 {
            self.num_workers = std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1);
        }
        if self.backlog == 0 {
            self.backlog = DEFAULT_QUEUE_SIZE;
        }
        if self.packet_size == 0 {
            self.packet_size = DEFAULT_BUFFER_CAPACITY;
        }
        if self.pool_size == 0 {
            self.pool_size = self.backlog;
        }
        self
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// NetFlow processor metrics
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Datagrams read from the socket
    pub packets_received: AtomicU64,

    /// Bytes read from the socket
    pub bytes_received: AtomicU64,

    /// Datagrams decoded and passed to the flow handler
    pub packets_parsed: AtomicU64,

    /// Datagrams dropped for bad framing
    pub packets_malformed: AtomicU64,

    /// Datagrams dropped for a version other than 5
    pub packets_wrong_version: AtomicU64,

    /// Flow records passed to the flow handler
    pub flows_received: AtomicU64,

    /// Socket read errors
    pub receive_errors: AtomicU64,
}

impl ProcessorMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_parsed: AtomicU64::new(0),
            packets_malformed: AtomicU64::new(0),
            packets_wrong_version: AtomicU64::new(0),
            flows_received: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
        }
    }

    /// Record a datagram read from the socket
    #[inline]
    pub fn packet_received(&self, bytes: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a decoded datagram and its flow count
    #[inline]
    pub fn packet_parsed(&self, flows: u64) {
        self.packets_parsed.fetch_add(1, Ordering::Relaxed);
        self.flows_received.fetch_add(flows, Ordering::Relaxed);
    }

    #[inline]
    pub fn packet_malformed(&self) {
        self.packets_malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn packet_wrong_version(&self) {
        self.packets_wrong_version.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> ProcessorMetricsSnapshot {
        ProcessorMetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_parsed: self.packets_parsed.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            packets_wrong_version: self.packets_wrong_version.load(Ordering::Relaxed),
            flows_received: self.flows_received.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of processor metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorMetricsSnapshot {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_parsed: u64,
    pub packets_malformed: u64,
    pub packets_wrong_version: u64,
    pub flows_received: u64,
    pub receive_errors: u64,
}

impl ProcessorMetricsSnapshot {
    /// Datagrams dropped by the decoder
    #[inline]
    pub fn packets_dropped(&self) -> u64 {
        self.packets_malformed + self.packets_wrong_version
    }
}

/// Combined snapshot of the processor, its dispatcher and its buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetflowMetricsSnapshot {
    pub processor: ProcessorMetricsSnapshot,
    pub dispatcher: DispatcherSnapshot,
    pub pool: BufferPoolSnapshot,
    pub pool_available: usize,
}

/// Handle for accessing NetFlow processor metrics
///
/// Cheap to clone and valid for the processor's whole lifetime, including
/// across `run`.
#[derive(Clone)]
pub struct NetflowMetricsHandle {
    id: String,
    processor: Arc<ProcessorMetrics>,
    dispatcher: Arc<DispatcherMetrics>,
    pool: Arc<BufferPool>,
}

impl NetflowMetricsHandle {
    /// Source identifier
    pub fn source_id(&self) -> &str {
        &self.id
    }

    /// Get a combined snapshot
    pub fn snapshot(&self) -> NetflowMetricsSnapshot {
        NetflowMetricsSnapshot {
            processor: self.processor.snapshot(),
            dispatcher: self.dispatcher.snapshot(),
            pool: self.pool.metrics().snapshot(),
            pool_available: self.pool.available(),
        }
    }
}

impl std::fmt::Debug for NetflowMetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetflowMetricsHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// NetFlow processor errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Builder finished without a flow handler
    #[error("no flow handler configured")]
    MissingHandler,

    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// `run` called while another `run` is active
    #[error("processor is already running")]
    AlreadyRunning,

    /// Fatal socket read error
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Dispatcher error
    #[error("dispatcher error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Check whether a read error means the socket was closed underneath us
///
/// Only meaningful once a stop has been requested; otherwise every read error
/// is fatal.
pub fn is_close_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
    ) || err.to_string().contains("closed")
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Processor`]
pub struct ProcessorBuilder {
    config: NetflowProcessorConfig,
    handler: Option<Arc<dyn FlowsHandler>>,
    socket: Option<std::net::UdpSocket>,
}

impl ProcessorBuilder {
    /// Set the flow handler
    pub fn handler<H: FlowsHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set a flow handler that is shared with other owners
    pub fn shared_handler(mut self, handler: Arc<dyn FlowsHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use an already bound socket instead of binding `config.address`
    pub fn socket(mut self, socket: std::net::UdpSocket) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Bind the socket and allocate the buffer pool
    ///
    /// # Errors
    ///
    /// Returns `MissingHandler` if no handler was set and `Bind` if the
    /// socket cannot be bound.
    pub fn build(self) -> Result<Processor> {
        let config = self.config.normalized();
        let handler = self.handler.ok_or(ProcessorError::MissingHandler)?;

        let socket = match self.socket {
            Some(socket) => {
                socket.set_nonblocking(true)?;
                if let Some(size) = config.recv_buffer_size {
                    set_recv_buffer_size(&SockRef::from(&socket), size);
                }
                socket
            }
            None => bind_socket(&config).map_err(|source| ProcessorError::Bind {
                address: config.address.clone(),
                source,
            })?,
        };

        let local_addr = socket.local_addr()?;

        let pool = Arc::new(BufferPool::new(config.pool_size, config.packet_size));
        if config.prefill_pool {
            pool.fill(config.pool_size);
        }

        tracing::debug!(
            source_id = %config.id,
            local_addr = %local_addr,
            pool_size = config.pool_size,
            packet_size = config.packet_size,
            prefilled = pool.available(),
            "netflow processor built"
        );

        let (running, _) = watch::channel(false);

        Ok(Processor {
            config,
            socket: Mutex::new(Some(socket)),
            local_addr,
            handler,
            pool,
            metrics: Arc::new(ProcessorMetrics::new()),
            dispatcher_metrics: Arc::new(DispatcherMetrics::new()),
            cancel: CancellationToken::new(),
            running,
        })
    }
}

/// Bind a UDP socket for `config.address`
fn bind_socket(config: &NetflowProcessorConfig) -> io::Result<std::net::UdpSocket> {
    let addr = config
        .address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing"))?;

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Some(size) = config.recv_buffer_size {
        set_recv_buffer_size(&SockRef::from(&socket), size);
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Request a kernel receive buffer; the OS may cap or ignore it
fn set_recv_buffer_size(socket: &SockRef<'_>, size: usize) {
    if let Err(e) = socket.set_recv_buffer_size(size) {
        tracing::warn!(
            error = %e,
            requested_size = size,
            "failed to set UDP SO_RCVBUF"
        );
    }
}

// =============================================================================
// Processor
// =============================================================================

/// NetFlow v5 UDP processor
///
/// Owns the socket, the buffer pool and the stop signal. A fresh dispatcher is
/// started by every call to [`run`](Self::run) and stopped before it returns.
pub struct Processor {
    /// Configuration with defaults applied
    config: NetflowProcessorConfig,

    /// Bound, non-blocking socket; taken and closed by `stop`
    socket: Mutex<Option<std::net::UdpSocket>>,

    local_addr: SocketAddr,

    handler: Arc<dyn FlowsHandler>,

    pool: Arc<BufferPool>,

    metrics: Arc<ProcessorMetrics>,

    dispatcher_metrics: Arc<DispatcherMetrics>,

    /// One-shot stop signal, never cleared
    cancel: CancellationToken,

    /// True while `run` is active
    running: watch::Sender<bool>,
}

impl Processor {
    /// Start building a processor
    pub fn builder(config: NetflowProcessorConfig) -> ProcessorBuilder {
        ProcessorBuilder {
            config,
            handler: None,
            socket: None,
        }
    }

    /// Run the receive loop until stopped
    ///
    /// Starts the dispatcher, then reads datagrams until [`stop`](Self::stop)
    /// is called. Every datagram accepted before the stop is handled before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns `Receive` on a socket read error that was not caused by a stop,
    /// and `AlreadyRunning` if another `run` is active.
    pub async fn run(&self) -> Result<()> {
        let started = self.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });
        if !started {
            return Err(ProcessorError::AlreadyRunning);
        }

        let result = self.receive().await;
        self.running.send_replace(false);
        result
    }

    async fn receive(&self) -> Result<()> {
        let socket = match self.socket.lock().as_ref() {
            Some(socket) => socket.try_clone()?,
            // Stopped before `run`
            None => return Ok(()),
        };
        let socket = UdpSocket::from_std(socket)?;

        let handler = NetflowBytesHandler::new(Arc::clone(&self.handler), Arc::clone(&self.metrics));
        let dispatcher = Dispatcher::new(
            self.config.num_workers,
            self.config.backlog,
            handler,
            Arc::clone(&self.pool),
        )?
        .with_metrics(Arc::clone(&self.dispatcher_metrics));
        dispatcher.run()?;

        tracing::info!(
            source_id = %self.config.id,
            address = ?socket.local_addr().ok(),
            num_workers = self.config.num_workers,
            backlog = self.config.backlog,
            packet_size = self.config.packet_size,
            "netflow processor listening"
        );

        let outcome = loop {
            let mut buf = self.pool.get_pooled();

            let received = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break Ok(()),

                received = socket.recv_buf_from(&mut *buf) => received,
            };

            match received {
                Ok((len, peer)) => {
                    self.metrics.packet_received(len as u64);
                    tracing::trace!(peer = %peer, len, "netflow datagram received");

                    if dispatcher.submit_job(buf).await.is_err() {
                        break Ok(());
                    }
                }
                Err(e) if self.cancel.is_cancelled() && is_close_error(&e) => break Ok(()),
                Err(e) => {
                    self.metrics.receive_error();
                    tracing::error!(
                        source_id = %self.config.id,
                        error = %e,
                        "netflow receive failed"
                    );
                    break Err(ProcessorError::Receive(e));
                }
            }
        };

        dispatcher.stop().await;

        tracing::info!(source_id = %self.config.id, "netflow processor stopped");

        outcome
    }

    /// Signal the receive loop to stop and close the socket
    ///
    /// Returns immediately; an in-flight read is abandoned. The port is
    /// released once the receive loop has returned.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(source_id = %self.config.id, "netflow processor stopping");
        }
        self.cancel.cancel();
        drop(self.socket.lock().take());
    }

    /// Stop, then wait until `run` has drained the dispatcher and returned
    pub async fn stop_and_wait(&self) {
        self.stop();

        let mut running = self.running.subscribe();
        let _ = running.wait_for(|running| !running).await;
    }

    /// Check if `run` is active
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Check if a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Address the socket is (or was, once stopped) bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    /// Configuration with defaults applied
    pub fn config(&self) -> &NetflowProcessorConfig {
        &self.config
    }

    /// Buffer pool shared by the receive loop and the workers
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<ProcessorMetrics> {
        &self.metrics
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> NetflowMetricsHandle {
        NetflowMetricsHandle {
            id: self.config.id.clone(),
            processor: Arc::clone(&self.metrics),
            dispatcher: Arc::clone(&self.dispatcher_metrics),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
