//! Intercom proxy binary.
//!
//! Authenticating reverse proxy in front of a backend intercom service:
//! forwards plain HTTP requests and long-lived WebSocket sessions, injecting
//! backend connection parameters derived from the caller's identity.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use intercom_proxy::config::loader::load_config;
use intercom_proxy::lifecycle::signals;
use intercom_proxy::observability::{logging, metrics};
use intercom_proxy::{HttpServer, ProxyConfig, Shutdown, StaticTokenProvider};

#[derive(Parser)]
#[command(name = "intercom-proxy", about = "Authenticating proxy for the HA Intercom service")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = ?config.backend.service_url,
        "intercom-proxy starting"
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_listener(shutdown.clone());

    let provider = Arc::new(StaticTokenProvider::new(&config.auth));
    let server = HttpServer::new(config, provider);
    server.run(listener, shutdown.handle()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
