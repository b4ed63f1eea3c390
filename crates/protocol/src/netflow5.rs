//! NetFlow v5 packet format
//!
//! NetFlow v5 is a fixed-format export protocol: a 24-byte header followed by
//! up to 30 records of 48 bytes each. All multi-byte integers are big-endian.
//!
//! # Wire Layout
//!
//! ```text
//! Header (24 bytes)
//!   0  version(2) | count(2) | sys_uptime_ms(4) | unix_secs(4) | unix_nsecs(4)
//!  16  flow_sequence(4) | engine_type(1) | engine_id(1) | sampling_interval(2)
//!
//! Flow record (48 bytes)
//!   0  srcaddr(4) | dstaddr(4) | nexthop(4) | input(2) | output(2)
//!  16  packets(4) | octets(4) | first(4) | last(4)
//!  32  src_port(2) | dst_port(2) | pad(1) | tcp_flags(1) | protocol(1) | tos(1)
//!  40  src_as(2) | dst_as(2) | src_mask(1) | dst_mask(1) | pad2(2)
//! ```

use std::net::Ipv4Addr;

use bytes::BufMut;

use crate::{ProtocolError, Result};

/// Protocol version carried in the first two bytes of every v5 datagram
pub const VERSION: u16 = 5;

/// Size of the packet header in bytes
pub const HEADER_SIZE: usize = 24;

/// Size of one flow record in bytes
pub const RECORD_SIZE: usize = 48;

/// Maximum number of flow records in one datagram
pub const MAX_FLOWS: usize = 30;

/// Largest valid v5 datagram (24 + 48 * 30)
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + RECORD_SIZE * MAX_FLOWS;

/// Sampling interval bits that carry the interval itself (the top two bits are the mode)
const SAMPLING_INTERVAL_MASK: u16 = 0x3FFF;

/// NetFlow v5 packet header, decoded to host byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub version: u16,
    /// Number of flow records that follow the header
    pub count: u16,
    /// Milliseconds since the exporting device booted
    pub sys_uptime_ms: u32,
    pub unix_secs: u32,
    pub unix_nsecs: u32,
    /// Sequence counter of total flows seen by the exporter
    pub flow_sequence: u32,
    pub engine_type: u8,
    pub engine_id: u8,
    /// Sampling mode (top 2 bits) and interval (low 14 bits)
    pub sampling_interval: u16,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: VERSION,
            count: 0,
            sys_uptime_ms: 0,
            unix_secs: 0,
            unix_nsecs: 0,
            flow_sequence: 0,
            engine_type: 0,
            engine_id: 0,
            sampling_interval: 0,
        }
    }
}

impl Header {
    /// Parse the header from the start of a datagram
    ///
    /// # Errors
    ///
    /// - `TooShort` if fewer than 24 bytes are available
    /// - `UnsupportedVersion` if the version field is not 5
    /// - `TooManyFlows` if the declared count exceeds 30
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::too_short(HEADER_SIZE, data.len()));
        }

        let version = read_u16(data, 0);
        if version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let count = read_u16(data, 2);
        if count as usize > MAX_FLOWS {
            return Err(ProtocolError::too_many_flows(count as usize));
        }

        Ok(Self {
            version,
            count,
            sys_uptime_ms: read_u32(data, 4),
            unix_secs: read_u32(data, 8),
            unix_nsecs: read_u32(data, 12),
            flow_sequence: read_u32(data, 16),
            engine_type: data[20],
            engine_id: data[21],
            sampling_interval: read_u16(data, 22),
        })
    }

    /// Write the header in wire order
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.version);
        buf.put_u16(self.count);
        buf.put_u32(self.sys_uptime_ms);
        buf.put_u32(self.unix_secs);
        buf.put_u32(self.unix_nsecs);
        buf.put_u32(self.flow_sequence);
        buf.put_u8(self.engine_type);
        buf.put_u8(self.engine_id);
        buf.put_u16(self.sampling_interval);
    }

    /// Sampling mode from the top two bits of `sampling_interval`
    #[inline]
    pub fn sampling_mode(&self) -> u8 {
        (self.sampling_interval >> 14) as u8
    }

    /// Effective sampling rate (1 when the exporter does not sample)
    #[inline]
    pub fn sampling_rate(&self) -> u32 {
        match self.sampling_interval & SAMPLING_INTERVAL_MASK {
            0 => 1,
            interval => interval as u32,
        }
    }

    /// Check if the exporter reports sampled traffic
    #[inline]
    pub fn is_sampled(&self) -> bool {
        self.sampling_interval & SAMPLING_INTERVAL_MASK != 0
    }

    /// Total datagram length implied by `count`
    #[inline]
    pub fn packet_len(&self) -> usize {
        encoded_len(self.count as usize)
    }
}

/// NetFlow v5 flow record, decoded to host byte order
///
/// Addresses are kept as the raw 32-bit value (`0x01020304` is `1.2.3.4`);
/// use [`FlowRecord::src_ip`] and friends for `Ipv4Addr` views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlowRecord {
    pub srcaddr: u32,
    pub dstaddr: u32,
    pub nexthop: u32,
    /// SNMP index of the input interface
    pub input_iface: u16,
    /// SNMP index of the output interface
    pub output_iface: u16,
    pub packets: u32,
    pub octets: u32,
    /// sys_uptime at the start of the flow
    pub first_uptime_ms: u32,
    /// sys_uptime when the last packet of the flow was seen
    pub last_uptime_ms: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub pad: u8,
    /// Cumulative OR of TCP flags
    pub tcp_flags: u8,
    /// IP protocol number (6 = TCP, 17 = UDP)
    pub protocol: u8,
    pub tos: u8,
    pub src_as: u16,
    pub dst_as: u16,
    pub src_mask: u8,
    pub dst_mask: u8,
    pub pad2: u16,
}

impl FlowRecord {
    /// Parse one 48-byte record
    ///
    /// # Errors
    ///
    /// Returns `TooShort` if fewer than 48 bytes are available.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_SIZE {
            return Err(ProtocolError::too_short(RECORD_SIZE, data.len()));
        }

        Ok(Self {
            srcaddr: read_u32(data, 0),
            dstaddr: read_u32(data, 4),
            nexthop: read_u32(data, 8),
            input_iface: read_u16(data, 12),
            output_iface: read_u16(data, 14),
            packets: read_u32(data, 16),
            octets: read_u32(data, 20),
            first_uptime_ms: read_u32(data, 24),
            last_uptime_ms: read_u32(data, 28),
            src_port: read_u16(data, 32),
            dst_port: read_u16(data, 34),
            pad: data[36],
            tcp_flags: data[37],
            protocol: data[38],
            tos: data[39],
            src_as: read_u16(data, 40),
            dst_as: read_u16(data, 42),
            src_mask: data[44],
            dst_mask: data[45],
            pad2: read_u16(data, 46),
        })
    }

    /// Write the record in wire order
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.srcaddr);
        buf.put_u32(self.dstaddr);
        buf.put_u32(self.nexthop);
        buf.put_u16(self.input_iface);
        buf.put_u16(self.output_iface);
        buf.put_u32(self.packets);
        buf.put_u32(self.octets);
        buf.put_u32(self.first_uptime_ms);
        buf.put_u32(self.last_uptime_ms);
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u8(self.pad);
        buf.put_u8(self.tcp_flags);
        buf.put_u8(self.protocol);
        buf.put_u8(self.tos);
        buf.put_u16(self.src_as);
        buf.put_u16(self.dst_as);
        buf.put_u8(self.src_mask);
        buf.put_u8(self.dst_mask);
        buf.put_u16(self.pad2);
    }

    #[inline]
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.srcaddr)
    }

    #[inline]
    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dstaddr)
    }

    #[inline]
    pub fn next_hop_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.nexthop)
    }

    /// Flow duration in milliseconds of exporter uptime
    ///
    /// Uptime counters wrap after ~49.7 days, so the difference is taken modulo 2^32.
    #[inline]
    pub fn duration_ms(&self) -> u32 {
        self.last_uptime_ms.wrapping_sub(self.first_uptime_ms)
    }
}

/// A parsed datagram: header plus the flow records it declared
///
/// `flows` borrows the caller's scratch array; copy anything that must
/// outlive the call that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: Header,
    pub flows: &'a [FlowRecord],
}

/// Parse a NetFlow v5 datagram
///
/// Records are decoded into `scratch`; the returned `flows` slice has exactly
/// `header.count` entries. No heap allocation takes place.
///
/// # Errors
///
/// Any header error (see [`Header::parse`]) or `Truncated` when the datagram is
/// shorter than `24 + 48 * count`. Trailing bytes beyond that length are ignored.
pub fn parse<'a>(data: &[u8], scratch: &'a mut [FlowRecord; MAX_FLOWS]) -> Result<Packet<'a>> {
    let header = Header::parse(data)?;
    let count = header.count as usize;

    let expected = encoded_len(count);
    if data.len() < expected {
        return Err(ProtocolError::Truncated {
            count,
            expected,
            actual: data.len(),
        });
    }

    let records = data[HEADER_SIZE..expected].chunks_exact(RECORD_SIZE);
    for (slot, record) in scratch.iter_mut().zip(records) {
        *slot = FlowRecord::parse(record)?;
    }

    Ok(Packet {
        header,
        flows: &scratch[..count],
    })
}

/// Encode a NetFlow v5 datagram
///
/// The header's `count` field is written as `flows.len()`; every other header
/// field is taken as given.
///
/// # Errors
///
/// Returns `TooManyFlows` if more than 30 records are supplied.
pub fn encode<B: BufMut>(header: &Header, flows: &[FlowRecord], buf: &mut B) -> Result<()> {
    if flows.len() > MAX_FLOWS {
        return Err(ProtocolError::too_many_flows(flows.len()));
    }

    let header = Header {
        count: flows.len() as u16,
        ..*header
    };
    header.write_to(buf);
    for flow in flows {
        flow.write_to(buf);
    }

    Ok(())
}

/// Wire length of a datagram carrying `count` records
#[inline]
pub const fn encoded_len(count: usize) -> usize {
    HEADER_SIZE + RECORD_SIZE * count
}

// =============================================================================
// Helper functions for reading big-endian values
// =============================================================================
//
// Callers bounds-check the whole header or record up front, so these index
// directly.

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
