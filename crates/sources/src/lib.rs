//! flowd - Sources
//!
//! Network sources that receive NetFlow datagrams and hand them to the
//! pipeline dispatcher.
//!
//! # Available Sources
//!
//! - **NetFlow v5** - UDP receive loop feeding pooled buffers to a bounded
//!   worker pool that decodes each datagram and invokes a flow handler
//!
//! # Design Principles
//!
//! - **Pooled buffers**: one `BytesMut` per datagram, drawn from and returned
//!   to a `BufferPool`
//! - **Async I/O**: built on `tokio`, the receive loop never blocks a runtime thread
//! - **Backpressure**: a full dispatcher queue suspends the receive loop
//! - **Cooperative stop**: a `CancellationToken` observed on every iteration
//!
//! # Example
//!
//! ```ignore
//! use flowd_sources::netflow::{NetflowProcessorConfig, Processor};
//!
//! let config = NetflowProcessorConfig::with_address("0.0.0.0:2055");
//! let processor = Processor::builder(config)
//!     .handler(|header: &Header, flows: &[FlowRecord]| {
//!         println!("{} flows from engine {}", flows.len(), header.engine_id);
//!     })
//!     .build()?;
//!
//! processor.run().await?;
//! ```

pub mod netflow;

pub use netflow::{
    FlowHandler, FlowsHandler, NetflowBytesHandler, NetflowMetricsHandle, NetflowMetricsSnapshot,
    NetflowProcessorConfig, PerFlow, Processor, ProcessorBuilder, ProcessorError,
    ProcessorMetrics, ProcessorMetricsSnapshot, is_close_error,
};
