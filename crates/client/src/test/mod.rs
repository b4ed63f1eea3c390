//! Test clients for flowd sources
//!
//! Simple clients for testing and benchmarking.
//! No batching, no retries - just bind and send.
//!
//! # Clients
//!
//! - [`NetflowUdpTestClient`] - NetFlow v5 datagrams over UDP
//!
//! # Example
//!
//! ```ignore
//! use flowd_client::test::NetflowUdpTestClient;
//! use flowd_client::PacketBuilder;
//!
//! let client = NetflowUdpTestClient::new().await?;
//! let packet = PacketBuilder::new().sequence(1).flow(flow);
//! client.send_packet_to(&packet, "127.0.0.1:2055").await?;
//! ```


pub use netflow_udp::NetflowUdpTestClient;
