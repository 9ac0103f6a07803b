//! HTTP interop bridge
//!
//! Serves a demonstration pipeline through the bridge, with the reference
//! network transport standing in for the external listener.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net (axum listener) ──▶ BridgeHandle ──▶ InteropAdapter
//!                                                            │
//!                                                            ▼
//!                                                      RequestContext
//!                                                            │
//!                                                            ▼
//!                                                     Pipeline (hello)
//!                                                            │
//!     Client ◀── net (fragment channel) ◀── BoundaryHandle ◀─ ResponseSink
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use http_bridge::bridge::AdapterOptions;
use http_bridge::config::{load_config, BridgeConfig};
use http_bridge::hello::HelloPipeline;
use http_bridge::lifecycle::{shutdown_signal, BridgeServer};
use http_bridge::net::{NetOptions, NetTransport};
use http_bridge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "http-bridge")]
#[command(about = "Serve a pipeline through the HTTP interop bridge", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address; repeat to listen on several. Overrides the config file.
    #[arg(short, long = "listen", value_name = "ADDRESS")]
    listen: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    if !cli.listen.is_empty() {
        config.server.addresses = cli.listen.clone();
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("http-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        addresses = ?config.server.addresses,
        concurrency = ?config.bridge.concurrency,
        request_timeout_secs = config.bridge.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let transport = Arc::new(NetTransport::new(NetOptions::from(&config.transport)));
    let server = BridgeServer::new(
        Arc::new(HelloPipeline),
        transport,
        AdapterOptions::from(&config.bridge),
    );

    server.start(config.server.addresses.as_slice()).await?;

    shutdown_signal().await;

    server.stop().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
