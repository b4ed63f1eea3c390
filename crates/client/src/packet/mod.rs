//! NetFlow v5 datagram builders
//!
//! - [`FlowBuilder`] - one flow record
//! - [`PacketBuilder`] - header plus up to 30 records, encoded to wire format
//! - [`SyntheticTraffic`] - endless stream of plausible datagrams

mod builder;
mod synthetic;

pub use builder::{FlowBuilder, PacketBuilder};
pub use synthetic::SyntheticTraffic;
