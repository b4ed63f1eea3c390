//! Tests for flow handlers and the bytes adapter

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flowd_pipeline::BytesHandler;
use flowd_protocol::netflow5::{self, MAX_FLOWS};
use flowd_protocol::{FlowRecord, Header};
use parking_lot::Mutex;

use crate::netflow::handler::{FlowHandler, FlowsHandler, NetflowBytesHandler, PerFlow};
use crate::netflow::processor::ProcessorMetrics;

/// Helper to encode a datagram with `count` flows numbered by source address
fn datagram(count: usize) -> Vec<u8> {
    let header = Header {
        flow_sequence: 100,
        engine_id: 3,
        ..Header::default()
    };
    let flows: Vec<FlowRecord> = (0..count as u32)
        .map(|i| FlowRecord {
            srcaddr: i,
            packets: 1,
            ..FlowRecord::default()
        })
        .collect();

    let mut wire = Vec::new();
    netflow5::encode(&header, &flows, &mut wire).unwrap();
    wire
}

/// Captured (flow_sequence, source addresses) per handler call
type Calls = Arc<Mutex<Vec<(u32, Vec<u32>)>>>;

fn recording_adapter() -> (NetflowBytesHandler, Calls, Arc<ProcessorMetrics>) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let metrics = Arc::new(ProcessorMetrics::new());

    let calls_c = Arc::clone(&calls);
    let handler = move |header: &Header, flows: &[FlowRecord]| {
        calls_c
            .lock()
            .push((header.flow_sequence, flows.iter().map(|f| f.srcaddr).collect()));
    };

    let adapter = NetflowBytesHandler::new(Arc::new(handler), Arc::clone(&metrics));
    (adapter, calls, metrics)
}

#[test]
fn test_closure_is_flows_handler() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_c = Arc::clone(&counter);
    let boxed: Box<dyn FlowsHandler> = Box::new(move |_: &Header, flows: &[FlowRecord]| {
        counter_c.fetch_add(flows.len(), Ordering::Relaxed);
    });
    boxed.handle_flows(&Header::default(), &[FlowRecord::default(); 3]);
    assert_eq!(counter.load(Ordering::Relaxed), 3);
}

#[test]
fn test_per_flow_visits_records_in_order() {
    let visits = Arc::new(Mutex::new(Vec::new()));

    let visits_c = Arc::clone(&visits);
    let per_flow = PerFlow(move |header: &Header, index: usize, flow: &FlowRecord| {
        visits_c.lock().push((header.engine_id, index, flow.srcaddr));
    });

    let header = Header {
        engine_id: 9,
        ..Header::default()
    };
    let flows = [
        FlowRecord {
            srcaddr: 10,
            ..FlowRecord::default()
        },
        FlowRecord {
            srcaddr: 20,
            ..FlowRecord::default()
        },
    ];
    per_flow.handle_flows(&header, &flows);

    assert_eq!(*visits.lock(), vec![(9, 0, 10), (9, 1, 20)]);
}

#[test]
fn test_per_flow_struct_handler() {
    struct Counter(AtomicUsize);

    impl FlowHandler for Counter {
        fn handle_flow(&self, _: &Header, _: usize, flow: &FlowRecord) {
            self.0.fetch_add(flow.packets as usize, Ordering::Relaxed);
        }
    }

    let per_flow = PerFlow(Counter(AtomicUsize::new(0)));
    let flows = [FlowRecord {
        packets: 5,
        ..FlowRecord::default()
    }; 4];
    per_flow.handle_flows(&Header::default(), &flows);

    assert_eq!(per_flow.0.0.load(Ordering::Relaxed), 20);
}

#[test]
fn test_adapter_forwards_decoded_flows() {
    let (adapter, calls, metrics) = recording_adapter();

    adapter.handle_bytes(&datagram(2));

    assert_eq!(*calls.lock(), vec![(100, vec![0, 1])]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.packets_parsed, 1);
    assert_eq!(snapshot.flows_received, 2);
    assert_eq!(snapshot.packets_dropped(), 0);
}

#[test]
fn test_adapter_zero_flows_invokes_handler() {
    let (adapter, calls, metrics) = recording_adapter();

    adapter.handle_bytes(&datagram(0));

    assert_eq!(*calls.lock(), vec![(100, vec![])]);
    assert_eq!(metrics.snapshot().packets_parsed, 1);
}

#[test]
fn test_adapter_max_flows() {
    let (adapter, calls, metrics) = recording_adapter();

    adapter.handle_bytes(&datagram(MAX_FLOWS));

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, (0..MAX_FLOWS as u32).collect::<Vec<_>>());
    assert_eq!(metrics.snapshot().flows_received, MAX_FLOWS as u64);
}

#[test]
fn test_adapter_skips_other_versions() {
    let (adapter, calls, metrics) = recording_adapter();

    let mut wire = datagram(1);
    wire[1] = 9;
    adapter.handle_bytes(&wire);

    assert!(calls.lock().is_empty());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.packets_wrong_version, 1);
    assert_eq!(snapshot.packets_malformed, 0);
}

#[test]
fn test_adapter_drops_truncated() {
    let (adapter, calls, metrics) = recording_adapter();

    let wire = datagram(3);
    adapter.handle_bytes(&wire[..wire.len() - 1]);

    // Shorter than a header
    adapter.handle_bytes(&wire[..10]);

    assert!(calls.lock().is_empty());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.packets_malformed, 2);
    assert_eq!(snapshot.packets_parsed, 0);
}

#[test]
fn test_adapter_ignores_trailing_bytes() {
    let (adapter, calls, _) = recording_adapter();

    let mut wire = datagram(1);
    wire.extend_from_slice(&[0xAA; 7]);
    adapter.handle_bytes(&wire);

    assert_eq!(*calls.lock(), vec![(100, vec![0])]);
}
