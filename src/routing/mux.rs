//! Strict route table.
//!
//! A mux that refuses overlapping registrations and instruments every
//! handler with per-pattern HTTP metrics.

use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use thiserror::Error;

/// Error type for route registration failures.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("pattern {0:?} was already registered")]
    Duplicate(String),

    #[error("pattern {new:?} shares a path prefix with registered pattern {existing:?}")]
    Overlap { existing: String, new: String },
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A registered handler; owns whatever state it needs via captures.
pub type RouteHandler = Box<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// Mux with strict, non-overlapping registration semantics.
///
/// A pattern serves both its exact path and its whole subtree; the
/// overlap rule keeps subtree matches unambiguous.
pub struct StrictMux {
    routes: Vec<(String, RouteHandler)>,

    http_requests: CounterVec,
    http_duration: HistogramVec,
}

impl StrictMux {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let http_requests = CounterVec::new(
            Opts::new("http_requests_total", "Requests served per handler."),
            &["handler", "method", "code"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Request duration per handler.",
            ),
            &["handler"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;

        Ok(Self {
            routes: Vec::new(),
            http_requests,
            http_duration,
        })
    }

    /// Register a handler for a pattern and its trailing-slash twin.
    ///
    /// Fails if the normalised pattern was previously registered, or if it
    /// shares a `/`-delimited prefix with an existing pattern in either
    /// direction.
    pub fn handle(&mut self, pattern: &str, handler: RouteHandler) -> Result<(), RegistrationError> {
        let sanitized = pattern.trim_end_matches('/').to_string();

        for (existing, _) in &self.routes {
            if *existing == sanitized {
                return Err(RegistrationError::Duplicate(sanitized));
            }
            if format!("{sanitized}/").starts_with(&format!("{existing}/"))
                || format!("{existing}/").starts_with(&format!("{sanitized}/"))
            {
                return Err(RegistrationError::Overlap {
                    existing: existing.clone(),
                    new: sanitized,
                });
            }
        }

        self.routes.push((sanitized, handler));
        Ok(())
    }

    /// Route a request to the handler owning its path, or 404.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let path = request.uri().path().trim_end_matches('/').to_string();
        let method = request.method().as_str().to_string();

        for (pattern, handler) in &self.routes {
            if path == *pattern || path.starts_with(&format!("{pattern}/")) {
                let timer = self
                    .http_duration
                    .with_label_values(&[pattern.as_str()])
                    .start_timer();
                let response = handler(request).await;
                timer.observe_duration();

                self.http_requests
                    .with_label_values(&[pattern.as_str(), method.as_str(), response.status().as_str()])
                    .inc();
                return response;
            }
        }

        StatusCode::NOT_FOUND.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler(tag: &'static str) -> RouteHandler {
        Box::new(move |_| Box::pin(async move { tag.into_response() }))
    }

    fn request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn mux() -> StrictMux {
        StrictMux::new(&Registry::new()).unwrap()
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut mux = mux();
        mux.handle("/api/v1/query", noop_handler("a")).unwrap();

        assert!(matches!(
            mux.handle("/api/v1/query", noop_handler("b")),
            Err(RegistrationError::Duplicate(_))
        ));
        // Trailing slash normalises to the same pattern.
        assert!(matches!(
            mux.handle("/api/v1/query/", noop_handler("c")),
            Err(RegistrationError::Duplicate(_))
        ));
    }

    #[test]
    fn test_overlap_rejected_in_both_orders() {
        let mut mux = mux();
        mux.handle("/api/v1/query", noop_handler("a")).unwrap();
        assert!(matches!(
            mux.handle("/api/v1/query/sub", noop_handler("b")),
            Err(RegistrationError::Overlap { .. })
        ));

        let mut mux = StrictMux::new(&Registry::new()).unwrap();
        mux.handle("/api/v1/query/sub", noop_handler("a")).unwrap();
        assert!(matches!(
            mux.handle("/api/v1/query", noop_handler("b")),
            Err(RegistrationError::Overlap { .. })
        ));
    }

    #[test]
    fn test_sibling_patterns_allowed() {
        let mut mux = mux();
        mux.handle("/api/v1/query", noop_handler("a")).unwrap();
        mux.handle("/api/v1/query_range", noop_handler("b")).unwrap();
        mux.handle("/federate", noop_handler("c")).unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_exact_trailing_slash_and_subtree() {
        let mut mux = mux();
        mux.handle("/graph", noop_handler("graph")).unwrap();

        for path in ["/graph", "/graph/", "/graph/explore"] {
            let response = mux.dispatch(request(path)).await;
            assert_eq!(body_text(response).await, "graph", "path {path}");
        }

        let response = mux.dispatch(request("/graphite")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
