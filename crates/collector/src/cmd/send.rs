//! Send command - Emit synthetic NetFlow v5 traffic
//!
//! Useful for exercising a running collector without a real exporter.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use flowd_client::SyntheticTraffic;
use flowd_client::test::NetflowUdpTestClient;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

/// Send command arguments
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Collector address
    #[arg(short, long, default_value = "127.0.0.1:2055")]
    pub target: String,

    /// Number of datagrams to send
    #[arg(short = 'n', long, default_value_t = 100)]
    pub count: u64,

    /// Flow records per datagram (0-30)
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u8).range(0..=30))]
    pub flows: u8,

    /// Datagrams per second; 0 sends as fast as possible
    #[arg(short, long, default_value_t = 0)]
    pub rate: u32,

    /// Engine ID stamped on every datagram
    #[arg(long, default_value_t = 0)]
    pub engine_id: u8,
}

/// Run the send command
pub async fn run(args: SendArgs) -> Result<()> {
    let mut client = NetflowUdpTestClient::new()
        .await
        .context("failed to create UDP socket")?;
    client
        .connect(&args.target)
        .await
        .with_context(|| format!("failed to connect to {}", args.target))?;

    let mut traffic = SyntheticTraffic::new(usize::from(args.flows)).engine_id(args.engine_id);

    info!(
        target = %args.target,
        count = args.count,
        flows_per_packet = traffic.flows_per_packet(),
        rate = args.rate,
        "sending synthetic netflow traffic"
    );

    let mut ticker = (args.rate > 0).then(|| {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(args.rate)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        ticker
    });

    let started = Instant::now();
    let mut bytes = 0u64;
    for _ in 0..args.count {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        let datagram = traffic.next_packet()?;
        bytes += client.send(&datagram).await.context("send failed")? as u64;
    }

    let elapsed = started.elapsed();
    info!(
        datagrams = args.count,
        flows = traffic.flow_sequence(),
        bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "synthetic traffic sent"
    );

    Ok(())
}
