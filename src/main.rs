//! API gateway entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ─▶ http::dispatch ─▶ routing::RouteTable
//!                                                           │
//!                                                           ▼
//!                                        filter chain: logging ─▶ rate_limit ─▶ auth
//!                                                           │
//!                                                           ▼
//!     Client Response                                 http::forward ─────▶ Upstream
//!     ◀───────────── http::response (error envelope) ◀──────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use api_gateway::config::loader::{finalize, JWT_SECRET_ENV};
use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::signals::spawn_signal_handler;
use api_gateway::observability::{logging, metrics};
use api_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Path-routing API gateway", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => finalize(GatewayConfig::default(), std::env::var(JWT_SECRET_ENV).ok())?,
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "api-gateway starting"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = GatewayServer::new(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
