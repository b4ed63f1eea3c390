//! flowd Client Library
//!
//! Builders for NetFlow v5 export datagrams and a UDP test client. It is
//! primarily used for:
//!
//! - **Testing**: valid datagrams for processor tests and the smoke test
//! - **Load generation**: the `flowd send` command
//!
//! # Quick Start
//!
//! ```
//! use std::net::Ipv4Addr;
//! use flowd_client::packet::{FlowBuilder, PacketBuilder};
//!
//! let flow = FlowBuilder::new()
//!     .src(Ipv4Addr::new(10, 0, 0, 1), 443)
//!     .dst(Ipv4Addr::new(192, 168, 1, 20), 51000)
//!     .protocol(6)
//!     .counters(12, 9000)
//!     .build();
//!
//! let datagram = PacketBuilder::new()
//!     .sequence(1)
//!     .timestamp_now()
//!     .flow(flow)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(datagram.len(), 24 + 48);
//! ```

mod error;

pub mod packet;
pub mod test;

pub use error::{BuilderError, Result};
pub use packet::{FlowBuilder, PacketBuilder, SyntheticTraffic};

// Re-export protocol types
pub use flowd_protocol::{FlowRecord, Header};
