//! Periodic metrics reporter
//!
//! Logs a combined processor / dispatcher / pool snapshot every interval,
//! with per-second rates derived from the previous snapshot.

use std::time::{Duration, Instant};

use flowd_sources::{NetflowMetricsHandle, NetflowMetricsSnapshot};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Per-second rates between two snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    pub packets_per_sec: f64,
    pub flows_per_sec: f64,
    pub bytes_per_sec: f64,
}

impl Rates {
    /// Rates between `previous` and `current`, `None` when no time elapsed
    pub fn between(
        previous: &NetflowMetricsSnapshot,
        current: &NetflowMetricsSnapshot,
        elapsed: Duration,
    ) -> Option<Self> {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }

        let delta = |now: u64, before: u64| now.saturating_sub(before) as f64 / secs;
        Some(Self {
            packets_per_sec: delta(
                current.processor.packets_received,
                previous.processor.packets_received,
            ),
            flows_per_sec: delta(
                current.processor.flows_received,
                previous.processor.flows_received,
            ),
            bytes_per_sec: delta(
                current.processor.bytes_received,
                previous.processor.bytes_received,
            ),
        })
    }
}

/// Reports metrics for one NetFlow processor
pub struct MetricsReporter {
    handle: NetflowMetricsHandle,
    interval: Duration,
    previous: Option<(Instant, NetflowMetricsSnapshot)>,
}

impl MetricsReporter {
    pub fn new(handle: NetflowMetricsHandle, interval: Duration) -> Self {
        Self {
            handle,
            interval,
            previous: None,
        }
    }

    /// Run until cancelled, then log one final report
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        info!(
            interval_secs = self.interval.as_secs(),
            source_id = self.handle.source_id(),
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.report(),
            }
        }

        self.report();
    }

    /// Take a snapshot and log it
    pub fn report(&mut self) {
        let now = Instant::now();
        let snapshot = self.handle.snapshot();
        let rates = self
            .previous
            .as_ref()
            .and_then(|(at, prev)| Rates::between(prev, &snapshot, now.duration_since(*at)))
            .unwrap_or_default();

        let p = &snapshot.processor;
        let d = &snapshot.dispatcher;
        info!(
            source_id = self.handle.source_id(),
            packets = p.packets_received,
            flows = p.flows_received,
            bytes = p.bytes_received,
            malformed = p.packets_malformed,
            wrong_version = p.packets_wrong_version,
            receive_errors = p.receive_errors,
            packets_per_sec = format_args!("{:.1}", rates.packets_per_sec),
            flows_per_sec = format_args!("{:.1}", rates.flows_per_sec),
            workers_busy = d.workers_busy,
            queued = d.queued(),
            handler_panics = d.handler_panics,
            pool_available = snapshot.pool_available,
            pool_hit_rate = format_args!("{:.3}", snapshot.pool.hit_rate()),
            "netflow metrics"
        );

        self.previous = Some((now, snapshot));
    }
}

#[cfg(test)]
#[path = "reporter_test.rs"]
mod reporter_test;
