//! Internal metrics exposition.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Registry, TextEncoder};
use tokio::net::TcpListener;

use crate::lifecycle::ShutdownListener;

/// Serve the registry in Prometheus text format on the internal listener.
pub async fn serve(
    registry: Registry,
    listener: TcpListener,
    mut shutdown: ShutdownListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Internal metrics server starting");

    let app = Router::new()
        .route("/metrics", get(handle_metrics))
        .with_state(registry);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
}

async fn handle_metrics(State(registry): State<Registry>) -> Result<String, StatusCode> {
    let mut buf = String::new();
    TextEncoder::new()
        .encode_utf8(&registry.gather(), &mut buf)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(buf)
}
