//! Flow handler contracts and the bytes-to-flows adapter

use std::sync::Arc;

use flowd_pipeline::BytesHandler;
use flowd_protocol::netflow5::{self, MAX_FLOWS};
use flowd_protocol::{FlowRecord, Header};

use super::processor::ProcessorMetrics;

/// Handles the decoded flows of one datagram
///
/// Called concurrently from up to `num_workers` workers. `flows` borrows
/// per-call scratch storage; copy records that must outlive the call.
pub trait FlowsHandler: Send + Sync + 'static {
    /// Process every flow record of one export packet
    fn handle_flows(&self, header: &Header, flows: &[FlowRecord]);
}

impl<F> FlowsHandler for F
where
    F: Fn(&Header, &[FlowRecord]) + Send + Sync + 'static,
{
    #[inline]
    fn handle_flows(&self, header: &Header, flows: &[FlowRecord]) {
        self(header, flows)
    }
}

/// Handles a single flow record
pub trait FlowHandler: Send + Sync + 'static {
    /// Process the record at `index` within its export packet
    fn handle_flow(&self, header: &Header, index: usize, flow: &FlowRecord);
}

impl<F> FlowHandler for F
where
    F: Fn(&Header, usize, &FlowRecord) + Send + Sync + 'static,
{
    #[inline]
    fn handle_flow(&self, header: &Header, index: usize, flow: &FlowRecord) {
        self(header, index, flow)
    }
}

/// Drives a [`FlowHandler`] once per record, in packet order
#[derive(Debug, Clone, Default)]
pub struct PerFlow<H>(pub H);

impl<H: FlowHandler> FlowsHandler for PerFlow<H> {
    fn handle_flows(&self, header: &Header, flows: &[FlowRecord]) {
        for (index, flow) in flows.iter().enumerate() {
            self.0.handle_flow(header, index, flow);
        }
    }
}

/// Decodes raw datagrams and forwards them to a [`FlowsHandler`]
///
/// This is the `BytesHandler` the processor installs on its dispatcher.
/// Datagrams that fail to decode are dropped here and recorded in
/// [`ProcessorMetrics`].
pub struct NetflowBytesHandler {
    handler: Arc<dyn FlowsHandler>,
    metrics: Arc<ProcessorMetrics>,
}

impl NetflowBytesHandler {
    pub fn new(handler: Arc<dyn FlowsHandler>, metrics: Arc<ProcessorMetrics>) -> Self {
        Self { handler, metrics }
    }
}

impl BytesHandler for NetflowBytesHandler {
    fn handle_bytes(&self, bytes: &[u8]) {
        let mut scratch = [FlowRecord::default(); MAX_FLOWS];

        match netflow5::parse(bytes, &mut scratch) {
            Ok(packet) => {
                self.metrics.packet_parsed(packet.flows.len() as u64);
                self.handler.handle_flows(&packet.header, packet.flows);
            }
            Err(e) if e.is_version_mismatch() => {
                self.metrics.packet_wrong_version();
                tracing::trace!(error = %e, len = bytes.len(), "netflow datagram skipped");
            }
            Err(e) => {
                self.metrics.packet_malformed();
                tracing::trace!(error = %e, len = bytes.len(), "netflow datagram malformed");
            }
        }
    }
}

impl std::fmt::Debug for NetflowBytesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetflowBytesHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod handler_test;
