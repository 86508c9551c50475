//! querygate
//!
//! A reverse proxy that sits in front of a Prometheus-compatible query
//! backend and shapes the traffic hitting it.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  QUERYGATE                   │
//!                      │                                              │
//!   Client Request     │  ┌────────┐   ┌─────────────────────────┐   │
//!   ──────────────────▶│  │ strict │──▶│ pipeline                │   │
//!                      │  │ router │   │ observer→jitter→        │   │
//!                      │  └───┬────┘   │ backpressure→exit       │   │
//!                      │      │        └───────────┬─────────────┘   │
//!                      │      │ passthrough        │                 │
//!                      │      ▼                    ▼                 │
//!   Client Response    │  ┌──────────────────────────────┐           │
//!   ◀──────────────────┼──│ forwarder (single-host hop)  │◀──────────┼── Upstream
//!                      │  └──────────────────────────────┘           │
//!                      │                                              │
//!                      │  background: health probe → monitoring URL   │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tokio::net::TcpListener;

use querygate::config::loader::load_config;
use querygate::config::validation::{parse_upstream_url, validate_config};
use querygate::http::{Forwarder, HttpServer};
use querygate::observability;
use querygate::pipeline::Entry;
use querygate::routing::Routes;
use querygate::{ProxyConfig, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init("querygate=debug,tower_http=debug");

    tracing::info!("querygate v0.1.0 starting");

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => {
            let config = ProxyConfig::default();
            validate_config(&config)?;
            config
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        backpressure = config.middleware.enable_backpressure,
        jitter = config.middleware.enable_jitter,
        observer = config.middleware.enable_observer,
        "Configuration loaded"
    );

    let upstream = parse_upstream_url(&config.upstream.url)?;

    let registry = Registry::new();
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let forwarder = Arc::new(Forwarder::new(&upstream)?);

    let entry = Arc::new(Entry::from_config(
        &config.middleware,
        Some(&registry),
        Arc::clone(&forwarder),
        &shutdown,
    )?);

    let routes = Arc::new(Routes::new(
        entry,
        forwarder,
        upstream,
        &registry,
        &config.passthrough.paths,
    )?);

    if !config.listener.internal_bind_address.is_empty() {
        let listener = TcpListener::bind(&config.listener.internal_bind_address).await?;
        let registry = registry.clone();
        let internal_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = observability::metrics::serve(registry, listener, internal_shutdown).await
            {
                tracing::error!(error = %e, "Internal metrics server stopped");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(routes, Duration::from_secs(config.timeouts.request_secs));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
