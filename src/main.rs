//! fixp-trader binary: opens a session against the configured exchange,
//! waits for it to establish, then runs until a shutdown signal arrives.
//!
//! `open` is followed by a real wait for ESTABLISHED (bounded by a startup
//! timeout), then a real block on `ctrl_c`/`SIGTERM` before `close` —
//! the process stays up for the life of the session rather than exiting
//! the moment the transport connects.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use fixp_trader::{Trader, TraderConfig};

/// FIX-over-WebSocket order-entry trading client.
#[derive(Parser, Debug)]
#[command(name = "fixp-trader", version, about = "FIX-over-WebSocket order-entry trading client")]
struct Cli {
    /// Wire encoding to negotiate with the exchange.
    #[arg(default_value = "SBE")]
    encoding: String,

    /// Path to the trader's TOML configuration file.
    #[arg(long, default_value = "/etc/fixp-trader/trader.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "fixp-trader starting");

    let mut config = match fixp_trader::config::load_config_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                path = %cli.config.display(),
                error = %e,
                "could not load config file; falling back to built-in defaults"
            );
            TraderConfig::default()
        }
    };
    config.encoding = cli.encoding;

    let trader = match Trader::new(config) {
        Ok(trader) => trader,
        Err(e) => {
            error!(error = %e, "failed to construct trader");
            std::process::exit(1);
        }
    };

    if let Err(e) = trader.open().await {
        error!(error = %e, "failed to open transport");
        std::process::exit(1);
    }

    match trader.wait_until_established(Duration::from_secs(10)).await {
        Ok(()) => info!(session = ?trader.id(), "session established"),
        Err(e) => warn!(error = %e, "session did not reach ESTABLISHED within startup timeout"),
    }

    shutdown_signal().await;
    info!("shutdown signal received, finalizing session");

    if let Err(e) = trader.close().await {
        error!(error = %e, "error while closing trader");
        std::process::exit(1);
    }
    info!("fixp-trader shut down cleanly");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
