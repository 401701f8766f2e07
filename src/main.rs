//! Procurement gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  PROCUREMENT GATEWAY                  │
//!                      │                                                       │
//!   Vendor request     │  ┌─────────┐   ┌───────────┐   ┌──────────────┐      │
//!   ───────────────────┼─▶│  http   │──▶│  routing  │──▶│   backend    │──────┼──▶ Backend
//!                      │  │ server  │   │ dialect + │   │ auth, policy │      │    API
//!                      │  └─────────┘   │ templates │   │ + client     │      │
//!                      │                └───────────┘   └──────┬───────┘      │
//!   Vendor response    │  ┌───────────┐                        │              │
//!   ◀──────────────────┼──│ transcode │◀───────────────────────┘              │
//!                      │  │ envelope  │                                       │
//!                      │  └───────────┘                                       │
//!                      │                                                       │
//!                      │  config · observability · lifecycle                  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use procurement_gateway::config::loader::load_config;
use procurement_gateway::lifecycle::{wait_for_signal, Shutdown};
use procurement_gateway::observability::{self, metrics};
use procurement_gateway::routing::load_route_table;
use procurement_gateway::{GatewayConfig, GatewayServer};

#[derive(Parser)]
#[command(name = "procurement-gateway")]
#[command(about = "Translates vendor purchasing-system calls into backend API calls", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    observability::init_tracing(&config.observability);
    tracing::info!("procurement-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        backend_timeout_ms = config.backend.request_timeout_ms,
        api_keys = config.auth.api_keys.len(),
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

    let routes = load_route_table(config.routing.api_config.as_deref()).await?;
    tracing::info!(
        routes = routes.len(),
        duplicates = routes.duplicates().len(),
        "Route table compiled"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::from_config(config, routes)?;
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
