//! Synthetic NetFlow traffic
//!
//! Deterministic datagrams for load generation and tests: addresses, ports
//! and counters are derived from the running flow sequence, so two
//! generators with the same settings emit identical streams (apart from the
//! export timestamp).

use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::BytesMut;
use flowd_protocol::netflow5::MAX_FLOWS;

use super::builder::{FlowBuilder, PacketBuilder};
use crate::error::Result;

/// Well-known destination ports cycled through by generated flows
const SERVICE_PORTS: [u16; 6] = [53, 80, 123, 443, 993, 8080];

/// Generator of plausible NetFlow v5 datagrams
#[derive(Debug, Clone)]
pub struct SyntheticTraffic {
    flows_per_packet: usize,
    engine_id: u8,
    flow_sequence: u32,
    started: Instant,
}

impl SyntheticTraffic {
    /// Create a generator emitting `flows_per_packet` records per datagram
    ///
    /// The count is clamped to 0..=30.
    pub fn new(flows_per_packet: usize) -> Self {
        Self {
            flows_per_packet: flows_per_packet.min(MAX_FLOWS),
            engine_id: 0,
            flow_sequence: 0,
            started: Instant::now(),
        }
    }

    /// Set the engine ID stamped on every datagram
    #[must_use]
    pub fn engine_id(mut self, engine_id: u8) -> Self {
        self.engine_id = engine_id;
        self
    }

    /// Records per datagram
    pub fn flows_per_packet(&self) -> usize {
        self.flows_per_packet
    }

    /// Total flows emitted so far
    pub fn flow_sequence(&self) -> u32 {
        self.flow_sequence
    }

    /// Build the next datagram
    pub fn next_packet(&mut self) -> Result<BytesMut> {
        let uptime_ms = self.started.elapsed().as_millis() as u32;

        let flows = (0..self.flows_per_packet as u32).map(|i| {
            let n = self.flow_sequence.wrapping_add(i);
            let tcp = n % 3 != 0;
            let packets = 1 + n % 97;

            FlowBuilder::new()
                .src(Ipv4Addr::from(0x0A00_0000 | (n & 0xFFFF)), 1024 + (n % 60_000) as u16)
                .dst(
                    Ipv4Addr::from(0xC0A8_0000 | (n.wrapping_mul(7) & 0xFFFF)),
                    SERVICE_PORTS[n as usize % SERVICE_PORTS.len()],
                )
                .interfaces(1, 2)
                .protocol(if tcp { 6 } else { 17 })
                .tcp_flags(if tcp { 0x1B } else { 0 })
                .counters(packets, packets * 512)
                .uptime_range(uptime_ms.saturating_sub(1000), uptime_ms)
                .masks(24, 24)
                .build()
        });

        let packet = PacketBuilder::new()
            .sequence(self.flow_sequence)
            .engine(0, self.engine_id)
            .sys_uptime(uptime_ms)
            .timestamp_now()
            .flows(flows)
            .build()?;

        self.flow_sequence = self
            .flow_sequence
            .wrapping_add(self.flows_per_packet as u32);

        Ok(packet)
    }
}
