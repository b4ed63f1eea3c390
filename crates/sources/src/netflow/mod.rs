//! NetFlow v5 source
//!
//! A [`Processor`] owns a UDP socket. Each datagram is read into a pooled
//! buffer and submitted to a [`Dispatcher`](flowd_pipeline::Dispatcher); a
//! worker decodes it with [`flowd_protocol::netflow5`] and calls the user's
//! [`FlowsHandler`] with the header and the decoded flow records.
//!
//! Datagrams with a version other than 5, or whose length does not match the
//! header's flow count, are counted and dropped without reaching the handler.

mod handler;
mod processor;

pub use handler::{FlowHandler, FlowsHandler, NetflowBytesHandler, PerFlow};
pub use processor::{
    NetflowMetricsHandle, NetflowMetricsSnapshot, NetflowProcessorConfig, Processor,
    ProcessorBuilder, ProcessorError, ProcessorMetrics, ProcessorMetricsSnapshot, Result,
    is_close_error,
};
