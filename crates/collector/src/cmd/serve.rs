//! Serve command - Run the NetFlow v5 collector

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use flowd_config::{Config, NetflowConfig};
use flowd_sources::{NetflowProcessorConfig, Processor};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::output::{FlowWriter, Format, Formatter};
use crate::reporter::MetricsReporter;

/// Config files tried in order when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/flowd.toml", "flowd.toml"];

/// Serve command arguments
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address, overriding `[netflow]` address and port
    #[arg(long)]
    pub listen: Option<String>,

    /// Flow output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Run the serve command
pub async fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    args: ServeArgs,
) -> Result<()> {
    let (config, loaded_from) = load_config(config_path.as_deref())?;

    let directive = config.log.directive(log_level.as_deref());
    crate::init_logging(&directive, config.log.format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        config = %loaded_from
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string()),
        "flowd starting"
    );

    if let Err(e) = run_server(config, args).await {
        error!(error = %e, "collector error");
        return Err(e);
    }

    info!("flowd shutdown complete");
    Ok(())
}

/// Load the configuration file
///
/// An explicit path must exist. Without one the default locations are tried
/// and built-in defaults apply when none exists.
fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let config = Config::from_file(path).context("failed to load configuration")?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for candidate in DEFAULT_CONFIG_PATHS.map(PathBuf::from) {
        if candidate.exists() {
            let config = Config::from_file(&candidate).context("failed to load configuration")?;
            return Ok((config, Some(candidate)));
        }
    }

    Ok((Config::default(), None))
}

/// Map the `[netflow]` section onto the processor configuration
pub fn processor_config(netflow: &NetflowConfig, listen: Option<&str>) -> NetflowProcessorConfig {
    NetflowProcessorConfig {
        address: listen.map_or_else(|| netflow.bind_address(), str::to_string),
        num_workers: netflow.num_workers,
        backlog: netflow.backlog,
        packet_size: netflow.packet_size,
        pool_size: netflow.pool_size,
        recv_buffer_size: netflow.recv_buffer_size,
        prefill_pool: netflow.prefill_pool,
        ..Default::default()
    }
}

/// Main collector run loop
async fn run_server(config: Config, args: ServeArgs) -> Result<()> {
    let cancel = CancellationToken::new();

    let use_color = std::io::stdout().is_terminal() && !args.no_color;
    let writer = FlowWriter::new(Formatter::new(args.format).with_color(use_color));

    let processor = Processor::builder(processor_config(&config.netflow, args.listen.as_deref()))
        .handler(writer)
        .build()
        .context("failed to create netflow processor")?;
    let processor = Arc::new(processor);

    let effective = processor.config();
    info!(
        source_id = %effective.id,
        address = %processor.local_addr()?,
        workers = effective.num_workers,
        backlog = effective.backlog,
        packet_size = effective.packet_size,
        format = ?args.format,
        "netflow processor listening"
    );

    let reporter = if config.metrics.enabled {
        let reporter = MetricsReporter::new(processor.metrics_handle(), config.metrics.interval);
        Some(tokio::spawn(reporter.run(cancel.clone())))
    } else {
        info!("metrics reporting disabled");
        None
    };

    let mut runner = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.run().await }
    });

    let outcome = tokio::select! {
        _ = wait_for_shutdown() => {
            info!("shutdown signal received, stopping collector...");
            processor.stop_and_wait().await;
            (&mut runner).await
        }
        // The receive loop ended on its own, e.g. a fatal socket error
        result = &mut runner => result,
    };

    cancel.cancel();
    if let Some(reporter) = reporter
        && let Err(e) = reporter.await
    {
        warn!(error = %e, "metrics reporter panicked during shutdown");
    }

    match outcome {
        Ok(result) => result.context("netflow processor failed"),
        Err(e) => Err(anyhow::anyhow!("netflow processor task panicked: {e}")),
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
