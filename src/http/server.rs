//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (tracing, timeout)
//! - Hand every request to the strict route table
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::lifecycle::ShutdownListener;
use crate::routing::Routes;

/// HTTP server for the query proxy.
pub struct HttpServer {
    routes: Arc<Routes>,
    request_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server over an assembled route table.
    pub fn new(routes: Arc<Routes>, request_timeout: Duration) -> Self {
        Self {
            routes,
            request_timeout,
        }
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(self.routes)
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http());

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every path goes through the strict route table; axum only provides the
/// connection plumbing.
async fn dispatch(State(routes): State<Arc<Routes>>, request: Request<Body>) -> Response {
    routes.dispatch(request).await
}
