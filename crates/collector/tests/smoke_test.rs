//! Smoke tests for the flowd collector
//!
//! These tests run a real processor on a loopback socket, send datagrams
//! with the test client and verify the decoded flows reach the handler.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use flowd_client::test::NetflowUdpTestClient;
use flowd_client::{FlowBuilder, PacketBuilder, SyntheticTraffic};
use flowd_protocol::{FlowRecord, Header};
use flowd_sources::{NetflowProcessorConfig, Processor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// One handler call: header plus a copy of its flows
type Delivery = (Header, Vec<FlowRecord>);

/// Start a processor on an ephemeral port that forwards every datagram
async fn start_processor(
    num_workers: usize,
) -> (
    Arc<Processor>,
    mpsc::UnboundedReceiver<Delivery>,
    JoinHandle<()>,
) {
    let (tx, rx) = mpsc::unbounded_channel();

    let config = NetflowProcessorConfig {
        address: "127.0.0.1:0".into(),
        num_workers,
        backlog: 16,
        ..Default::default()
    };
    let processor = Processor::builder(config)
        .handler(move |header: &Header, flows: &[FlowRecord]| {
            let _ = tx.send((*header, flows.to_vec()));
        })
        .build()
        .expect("failed to build processor");
    let processor = Arc::new(processor);

    let handle = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move {
            processor.run().await.expect("processor failed");
        }
    });

    // Give the receive loop time to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(processor.is_running());

    (processor, rx, handle)
}

async fn connected_client(processor: &Processor) -> NetflowUdpTestClient {
    let target = processor.local_addr().unwrap().to_string();
    let mut client = NetflowUdpTestClient::bind("127.0.0.1:0")
        .await
        .expect("failed to bind client");
    client.connect(&target).await.expect("failed to connect");
    client
}

#[tokio::test]
async fn test_single_datagram_end_to_end() {
    let (processor, mut rx, handle) = start_processor(2).await;
    let client = connected_client(&processor).await;

    let flow = FlowBuilder::new()
        .src(Ipv4Addr::new(10, 1, 2, 3), 40000)
        .dst(Ipv4Addr::new(172, 16, 0, 9), 22)
        .protocol(6)
        .tcp_flags(0x18)
        .counters(12, 2400)
        .uptime_range(5_000, 9_000)
        .build();
    let packet = PacketBuilder::new()
        .sequence(1000)
        .engine(0, 4)
        .timestamp(1_700_000_000, 0)
        .flow(flow);

    client.send_packet(&packet).await.expect("send failed");

    let (header, flows) = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timeout waiting for flows")
        .expect("channel closed");

    assert_eq!(header, packet.header());
    assert_eq!(header.count, 1);
    assert_eq!(flows, vec![flow]);
    assert_eq!(flows[0].src_ip(), Ipv4Addr::new(10, 1, 2, 3));
    assert_eq!(flows[0].duration_ms(), 4_000);

    processor.stop_and_wait().await;
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_burst_all_delivered() {
    const DATAGRAMS: usize = 50;

    let (processor, mut rx, handle) = start_processor(4).await;
    let client = connected_client(&processor).await;

    let mut traffic = SyntheticTraffic::new(10);
    for _ in 0..DATAGRAMS {
        let datagram = traffic.next_packet().unwrap();
        client.send(&datagram).await.expect("send failed");
        // Loopback rarely drops, but keep the kernel buffer from overflowing
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut sequences = Vec::new();
    while sequences.len() < DATAGRAMS {
        let (header, flows) = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout waiting for flows")
            .expect("channel closed");
        assert_eq!(flows.len(), 10);
        sequences.push(header.flow_sequence);
    }

    // Workers may finish out of order; every datagram arrives exactly once
    sequences.sort_unstable();
    let expected: Vec<u32> = (0..DATAGRAMS as u32).map(|i| i * 10).collect();
    assert_eq!(sequences, expected);

    processor.stop_and_wait().await;
    handle.await.unwrap();

    let snapshot = processor.metrics_handle().snapshot();
    assert_eq!(snapshot.processor.packets_parsed, DATAGRAMS as u64);
    assert_eq!(snapshot.processor.flows_received, (DATAGRAMS * 10) as u64);
    assert_eq!(snapshot.pool.outstanding(), 0);
}

#[tokio::test]
async fn test_garbage_is_dropped_and_collector_keeps_running() {
    let (processor, mut rx, handle) = start_processor(1).await;
    let client = connected_client(&processor).await;

    client.send(&[0xFF; 7]).await.unwrap();
    client.send(&[0x00, 0x09, 0x00, 0x01]).await.unwrap();
    client
        .send_packet(&PacketBuilder::new().sequence(7).flow(FlowRecord::default()))
        .await
        .unwrap();

    let (header, _) = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timeout waiting for flows")
        .expect("channel closed");
    assert_eq!(header.flow_sequence, 7);

    processor.stop_and_wait().await;
    handle.await.unwrap();

    let snapshot = processor.metrics_handle().snapshot();
    assert_eq!(snapshot.processor.packets_received, 3);
    assert_eq!(snapshot.processor.packets_parsed, 1);
    assert_eq!(snapshot.processor.packets_dropped(), 2);
    assert!(rx.try_recv().is_err());
}
