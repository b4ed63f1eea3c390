//! flowd - NetFlow v5 collector
//!
//! # Usage
//!
//! ```bash
//! # Run the collector (default)
//! flowd
//! flowd --config configs/flowd.toml
//!
//! # Emit synthetic v5 traffic at a running collector
//! flowd send --target 127.0.0.1:2055 --count 1000 --rate 500
//! ```

mod cmd;
mod output;
mod reporter;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowd_config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// flowd - NetFlow v5 collector
#[derive(Parser, Debug)]
#[command(name = "flowd")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive NetFlow v5 datagrams and print the decoded flows
    Serve(cmd::serve::ServeArgs),

    /// Send synthetic NetFlow v5 traffic
    Send(cmd::send::SendArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Send(args)) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), LogFormat::Console)?;
            cmd::send::run(args).await
        }
        Some(Command::Serve(args)) => cmd::serve::run(cli.config, cli.log_level, args).await,
        // No subcommand = serve with defaults
        None => cmd::serve::run(cli.config, cli.log_level, cmd::serve::ServeArgs::default()).await,
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG`-style directives are accepted; an unparsable level falls back
/// to `info`.
pub(crate) fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    // Logs go to stderr so decoded flows own stdout
    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .with(filter)
            .init(),
    }

    Ok(())
}
