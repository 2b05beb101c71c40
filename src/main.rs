//! Edge Gateway
//!
//! Single ingress point in front of the platform's backend services.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net (listener / TLS) ──▶ http server (request id, tracing, limit)
//!                                                   │
//!                                                   ▼
//!                     ┌──────────────────── dispatcher ────────────────────┐
//!                     │ auth (allowlist, bearer token)                     │
//!                     │   → security (rate limit, body size, headers)      │
//!                     │   → routing (route table, service registry)        │
//!                     │   → resilience (breaker permit, retry, fallback)   │
//!                     └───────────────────────┬────────────────────────────┘
//!                                             ▼
//!     Client Response ◀──────────── upstream client ◀────────────── Backend Service
//!
//!     Cross-cutting: config (TOML, hot reload), observability (tracing, metrics),
//!                    lifecycle (signals, graceful shutdown), admin API
//! ```

use clap::Parser;
use std::path::PathBuf;

use edge_gateway::config::{self, watcher::ConfigWatcher, GatewayConfig};
use edge_gateway::lifecycle::{signals, Shutdown};
use edge_gateway::net::{listener, tls};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "edge-gateway", version, about = "Edge API gateway")]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: GatewayConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_defaults()?,
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        services = config.services.len(),
        max_connections = config.listener.max_connections,
        upstream_timeout_ms = config.timeouts.upstream_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    // Keep the watcher alive for the life of the server.
    let mut _watcher = None;
    let mut server = HttpServer::new(config.clone());
    if let Some(path) = &args.config {
        let (watcher, updates) = ConfigWatcher::new(path);
        match watcher.run() {
            Ok(w) => {
                _watcher = Some(w);
                server = server.with_config_updates(updates);
            }
            Err(e) => tracing::warn!(error = %e, "Config hot reload disabled"),
        }
    }

    match &config.listener.tls {
        Some(tls_config) => {
            let addr = listener::bind_address(&config.listener)?;
            let rustls = tls::load_tls_config(tls_config).await?;
            server.run_tls(addr, rustls, shutdown).await?;
        }
        None => {
            let listener = listener::bind(&config.listener).await?;
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
