//! flowd Protocol - NetFlow v5 wire format
//!
//! This crate provides the fixed-layout types that flow through the collector:
//! - `Header` - 24-byte NetFlow v5 packet header
//! - `FlowRecord` - 48-byte NetFlow v5 flow record
//! - `Packet` - A parsed header plus a borrowed slice of flow records
//!
//! # Design Principles
//!
//! - **Explicit big-endian readers**: every field is decoded from its wire offset,
//!   never by reinterpreting the receive buffer as a struct
//! - **No allocations in hot path**: records are decoded into a caller-provided
//!   stack array (`[FlowRecord; MAX_FLOWS]`)
//! - **Strict framing**: a datagram shorter than `24 + 48 * count` is rejected
//!
//! # Example
//!
//! ```
//! use flowd_protocol::netflow5::{self, FlowRecord, Header, MAX_FLOWS};
//!
//! let header = Header { flow_sequence: 7, ..Header::default() };
//! let flows = [FlowRecord { srcaddr: 0x0a000001, ..FlowRecord::default() }];
//!
//! let mut wire = Vec::new();
//! netflow5::encode(&header, &flows, &mut wire).unwrap();
//!
//! let mut scratch = [FlowRecord::default(); MAX_FLOWS];
//! let packet = netflow5::parse(&wire, &mut scratch).unwrap();
//! assert_eq!(packet.header.flow_sequence, 7);
//! assert_eq!(packet.flows.len(), 1);
//! ```

mod error;
pub mod netflow5;

pub use error::ProtocolError;
pub use netflow5::{FlowRecord, Header, Packet};

// Re-export bytes for convenience
pub use bytes::{BufMut, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
