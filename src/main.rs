//! socket-gateway binary: a WebSocket/HTTP gateway in front of an in-process bus.

use std::path::PathBuf;

use clap::Parser;

use socket_gateway::config::{load_config, GatewayConfig};
use socket_gateway::lifecycle::{self, signals};
use socket_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "socket-gateway")]
#[command(about = "WebSocket and HTTP gateway bridging clients onto a message bus", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server_port` from the configuration.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if cli.port.is_some() {
        config.server_port = cli.port;
    }

    logging::init(config.observability.log_filter.as_deref());
    tracing::info!("socket-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.observability.metrics_address.as_deref() {
        match addr.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(metrics_address = %addr, "Failed to parse metrics address"),
        }
    }

    tracing::info!(
        port = ?config.server_port,
        tls = config.server_ca.is_some(),
        destination = config.dst_addr.as_deref().unwrap_or("<broadcast>"),
        http_mode = ?config.http_mode,
        "Configuration loaded"
    );

    let running = lifecycle::start(&config)?;
    tracing::info!(address = %running.local_addr, "Ready");

    signals::wait_for_signal().await;

    // Joining the reactor thread blocks.
    tokio::task::spawn_blocking(move || running.shutdown()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
