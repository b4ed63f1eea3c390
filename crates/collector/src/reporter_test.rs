use std::time::Duration;

use flowd_protocol::{FlowRecord, Header};
use flowd_sources::{NetflowProcessorConfig, Processor};
use tokio_util::sync::CancellationToken;

use super::{MetricsReporter, Rates};

fn idle_processor() -> Processor {
    Processor::builder(NetflowProcessorConfig::with_address("127.0.0.1:0"))
        .handler(|_: &Header, _: &[FlowRecord]| {})
        .build()
        .unwrap()
}

#[test]
fn test_rates_between_snapshots() {
    let processor = idle_processor();
    let handle = processor.metrics_handle();

    let before = handle.snapshot();
    for _ in 0..10 {
        processor.metrics().packet_received(100);
        processor.metrics().packet_parsed(3);
    }
    let after = handle.snapshot();

    let rates = Rates::between(&before, &after, Duration::from_secs(2)).unwrap();
    assert_eq!(rates.packets_per_sec, 5.0);
    assert_eq!(rates.flows_per_sec, 15.0);
    assert_eq!(rates.bytes_per_sec, 500.0);
}

#[test]
fn test_rates_zero_elapsed() {
    let processor = idle_processor();
    let snapshot = processor.metrics_handle().snapshot();

    assert!(Rates::between(&snapshot, &snapshot, Duration::ZERO).is_none());
}

#[test]
fn test_report_remembers_previous() {
    let processor = idle_processor();
    let mut reporter = MetricsReporter::new(processor.metrics_handle(), Duration::from_secs(60));

    assert!(reporter.previous.is_none());
    reporter.report();
    processor.metrics().packet_received(64);
    reporter.report();

    let (_, previous) = reporter.previous.as_ref().unwrap();
    assert_eq!(previous.processor.packets_received, 1);
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let processor = idle_processor();
    let reporter = MetricsReporter::new(processor.metrics_handle(), Duration::from_millis(10));

    let cancel = CancellationToken::new();
    let task = tokio::spawn(reporter.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("reporter should stop")
        .unwrap();
}
