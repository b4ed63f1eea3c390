//! Flow record and datagram builders

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use flowd_protocol::netflow5::{self, MAX_FLOWS};
use flowd_protocol::{FlowRecord, Header};

use crate::error::{BuilderError, Result};

/// Mask for the 14-bit sampling interval
const SAMPLING_INTERVAL_MASK: u16 = 0x3FFF;

/// Builder for a single flow record
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use flowd_client::packet::FlowBuilder;
///
/// let flow = FlowBuilder::new()
///     .src(Ipv4Addr::new(10, 0, 0, 1), 53000)
///     .dst(Ipv4Addr::new(8, 8, 8, 8), 53)
///     .protocol(17)
///     .counters(1, 72)
///     .build();
///
/// assert_eq!(flow.dst_port, 53);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowBuilder {
    record: FlowRecord,
}

impl FlowBuilder {
    /// Create a new flow builder with every field zero
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source address and port
    #[inline]
    #[must_use]
    pub fn src(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.record.srcaddr = addr.into();
        self.record.src_port = port;
        self
    }

    /// Set the destination address and port
    #[inline]
    #[must_use]
    pub fn dst(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.record.dstaddr = addr.into();
        self.record.dst_port = port;
        self
    }

    /// Set the next-hop router address
    #[inline]
    #[must_use]
    pub fn next_hop(mut self, addr: Ipv4Addr) -> Self {
        self.record.nexthop = addr.into();
        self
    }

    /// Set the SNMP input and output interface indices
    #[inline]
    #[must_use]
    pub fn interfaces(mut self, input: u16, output: u16) -> Self {
        self.record.input_iface = input;
        self.record.output_iface = output;
        self
    }

    /// Set the IP protocol number (6 = TCP, 17 = UDP)
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.record.protocol = protocol;
        self
    }

    /// Set the cumulative OR of TCP flags
    #[inline]
    #[must_use]
    pub fn tcp_flags(mut self, flags: u8) -> Self {
        self.record.tcp_flags = flags;
        self
    }

    /// Set the IP type of service
    #[inline]
    #[must_use]
    pub fn tos(mut self, tos: u8) -> Self {
        self.record.tos = tos;
        self
    }

    /// Set the packet and octet counters
    #[inline]
    #[must_use]
    pub fn counters(mut self, packets: u32, octets: u32) -> Self {
        self.record.packets = packets;
        self.record.octets = octets;
        self
    }

    /// Set the exporter uptime (ms) at the first and last packet of the flow
    #[inline]
    #[must_use]
    pub fn uptime_range(mut self, first_ms: u32, last_ms: u32) -> Self {
        self.record.first_uptime_ms = first_ms;
        self.record.last_uptime_ms = last_ms;
        self
    }

    /// Set the source and destination autonomous systems
    #[inline]
    #[must_use]
    pub fn as_numbers(mut self, src_as: u16, dst_as: u16) -> Self {
        self.record.src_as = src_as;
        self.record.dst_as = dst_as;
        self
    }

    /// Set the source and destination prefix mask lengths
    #[inline]
    #[must_use]
    pub fn masks(mut self, src_mask: u8, dst_mask: u8) -> Self {
        self.record.src_mask = src_mask;
        self.record.dst_mask = dst_mask;
        self
    }

    /// Finish the record
    #[inline]
    pub fn build(self) -> FlowRecord {
        self.record
    }
}

/// Builder for a NetFlow v5 export datagram
///
/// The header `count` is always derived from the records added.
///
/// # Example
///
/// ```
/// use flowd_client::packet::PacketBuilder;
/// use flowd_client::FlowRecord;
///
/// let datagram = PacketBuilder::new()
///     .sequence(100)
///     .engine(1, 7)
///     .flows([FlowRecord::default(); 3])
///     .build()
///     .unwrap();
///
/// assert_eq!(datagram.len(), 24 + 3 * 48);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    header: Header,
    flows: Vec<FlowRecord>,
}

impl PacketBuilder {
    /// Create a new packet builder (version 5, no flows)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sequence number of the first flow in this datagram
    #[inline]
    #[must_use]
    pub fn sequence(mut self, flow_sequence: u32) -> Self {
        self.header.flow_sequence = flow_sequence;
        self
    }

    /// Set the exporter engine type and slot
    #[inline]
    #[must_use]
    pub fn engine(mut self, engine_type: u8, engine_id: u8) -> Self {
        self.header.engine_type = engine_type;
        self.header.engine_id = engine_id;
        self
    }

    /// Set the sampling mode (2 bits) and interval (14 bits)
    #[inline]
    #[must_use]
    pub fn sampling(mut self, mode: u8, interval: u16) -> Self {
        self.header.sampling_interval =
            (u16::from(mode & 0x03) << 14) | (interval & SAMPLING_INTERVAL_MASK);
        self
    }

    /// Set the exporter uptime in milliseconds
    #[inline]
    #[must_use]
    pub fn sys_uptime(mut self, uptime_ms: u32) -> Self {
        self.header.sys_uptime_ms = uptime_ms;
        self
    }

    /// Set the export timestamp
    #[inline]
    #[must_use]
    pub fn timestamp(mut self, unix_secs: u32, unix_nsecs: u32) -> Self {
        self.header.unix_secs = unix_secs;
        self.header.unix_nsecs = unix_nsecs;
        self
    }

    /// Set the export timestamp to now
    #[inline]
    #[must_use]
    pub fn timestamp_now(self) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.timestamp(now.as_secs() as u32, now.subsec_nanos())
    }

    /// Add one flow record
    #[inline]
    #[must_use]
    pub fn flow(mut self, flow: FlowRecord) -> Self {
        self.flows.push(flow);
        self
    }

    /// Add several flow records
    #[must_use]
    pub fn flows(mut self, flows: impl IntoIterator<Item = FlowRecord>) -> Self {
        self.flows.extend(flows);
        self
    }

    /// Number of records added so far
    #[inline]
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Header as it will be encoded
    pub fn header(&self) -> Header {
        Header {
            count: self.flows.len() as u16,
            ..self.header
        }
    }

    /// Encode the datagram
    ///
    /// # Errors
    ///
    /// Returns `TooManyFlows` if more than 30 records were added.
    pub fn build(&self) -> Result<BytesMut> {
        if self.flows.len() > MAX_FLOWS {
            return Err(BuilderError::TooManyFlows {
                count: self.flows.len(),
                max: MAX_FLOWS,
            });
        }

        let mut buf = BytesMut::with_capacity(netflow5::encoded_len(self.flows.len()));
        netflow5::encode(&self.header, &self.flows, &mut buf)?;
        Ok(buf)
    }
}
