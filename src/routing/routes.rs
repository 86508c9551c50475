//! Route table for the Prometheus query API surface.
//!
//! Instant and range queries enter the middleware pipeline; a fixed set of
//! API paths plus the operator allow-list pass straight through to the
//! upstream.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::Registry;
use thiserror::Error;
use url::Url;

use crate::http::error::prometheus_api_error;
use crate::http::Forwarder;
use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{instant_from_request, range_from_request};
use crate::pipeline::Entry;
use crate::routing::mux::{RegistrationError, RouteHandler, StrictMux};

/// API paths forwarded to upstream without traversing the pipeline.
const PASSTHROUGH_API_PATHS: &[&str] = &[
    "/federate",
    "/graph",
    "/ui",
    "/api/v1/alerts",
    "/api/v1/rules",
    "/api/v1/series",
    "/api/v1/query_exemplars",
];

/// Error type for route table construction failures.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("passthrough path {0:?} is not a valid URI path")]
    InvalidPassthrough(String),

    #[error("passthrough path {0:?} is not allowed")]
    DisallowedPassthrough(String),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// The complete, immutable route table.
pub struct Routes {
    mux: StrictMux,
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes").finish_non_exhaustive()
    }
}

impl Routes {
    pub fn new(
        entry: Arc<Entry>,
        forwarder: Arc<Forwarder>,
        upstream: Url,
        registry: &Registry,
        passthrough_paths: &[String],
    ) -> Result<Self, RouteError> {
        let mut mux = StrictMux::new(registry)?;

        mux.handle(
            "/api/v1/query",
            instant_handler(Arc::clone(&entry), upstream.clone()),
        )?;
        mux.handle(
            "/api/v1/query_range",
            range_handler(Arc::clone(&entry), upstream),
        )?;

        for path in PASSTHROUGH_API_PATHS {
            mux.handle(path, passthrough_handler(Arc::clone(&forwarder)))?;
        }

        mux.handle("/healthz", healthz_handler())?;

        // Validate the whole allow-list before registering any of it.
        for path in passthrough_paths {
            validate_passthrough_path(path)?;
        }
        for path in passthrough_paths {
            mux.handle(path, passthrough_handler(Arc::clone(&forwarder)))?;
        }

        Ok(Self { mux })
    }

    pub async fn dispatch(&self, request: axum::http::Request<axum::body::Body>) -> axum::response::Response {
        self.mux.dispatch(request).await
    }
}

/// Operator paths must be plain, absolute URI paths: non-empty, not the
/// root, and identical to their parsed canonical form so encodings and
/// regex-like patterns are rejected.
fn validate_passthrough_path(path: &str) -> Result<(), RouteError> {
    if path.is_empty() || path == "/" {
        return Err(RouteError::DisallowedPassthrough(path.to_string()));
    }

    let url = Url::parse(&format!("http://example.com{path}"))
        .map_err(|_| RouteError::InvalidPassthrough(path.to_string()))?;
    if url.path() != path {
        return Err(RouteError::InvalidPassthrough(path.to_string()));
    }

    Ok(())
}

fn instant_handler(entry: Arc<Entry>, base: Url) -> RouteHandler {
    Box::new(move |request| {
        let entry = Arc::clone(&entry);
        let base = base.clone();
        Box::pin(async move {
            let instant = match instant_from_request(&base, &request) {
                Ok(req) => req,
                Err(e) => {
                    return prometheus_api_error(
                        format!("failed to read instant request: {e}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                }
            };

            match entry.query_instant(instant).await {
                Ok(response) => response,
                Err(PipelineError::Upstream(e)) => {
                    tracing::error!(error = %e, "proxy error");
                    StatusCode::BAD_GATEWAY.into_response()
                }
                Err(e) => prometheus_api_error(
                    format!("failed to process instant request: {e}"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
            }
        })
    })
}

fn range_handler(entry: Arc<Entry>, base: Url) -> RouteHandler {
    Box::new(move |request| {
        let entry = Arc::clone(&entry);
        let base = base.clone();
        Box::pin(async move {
            let range = match range_from_request(&base, &request) {
                Ok(req) => req,
                Err(e) => {
                    return prometheus_api_error(
                        format!("failed to read range request: {e}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                }
            };

            match entry.query_range(range).await {
                Ok(response) => response,
                Err(PipelineError::Upstream(e)) => {
                    tracing::error!(error = %e, "proxy error");
                    StatusCode::BAD_GATEWAY.into_response()
                }
                Err(e) => prometheus_api_error(
                    format!("failed to process range request: {e}"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
            }
        })
    })
}

fn passthrough_handler(forwarder: Arc<Forwarder>) -> RouteHandler {
    Box::new(move |request| {
        let forwarder = Arc::clone(&forwarder);
        Box::pin(async move {
            match forwarder.forward(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "proxy error");
                    StatusCode::BAD_GATEWAY.into_response()
                }
            }
        })
    })
}

fn healthz_handler() -> RouteHandler {
    Box::new(|_| {
        Box::pin(async { axum::Json(serde_json::json!({"ok": true})).into_response() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MiddlewareConfig;
    use crate::lifecycle::Shutdown;

    fn build(passthrough: &[String]) -> Result<Routes, RouteError> {
        let upstream = Url::parse("http://127.0.0.1:9090").unwrap();
        let forwarder = Arc::new(Forwarder::new(&upstream).unwrap());
        let registry = Registry::new();
        let entry = Arc::new(
            Entry::from_config(
                &MiddlewareConfig::default(),
                Some(&registry),
                Arc::clone(&forwarder),
                &Shutdown::new(),
            )
            .unwrap(),
        );

        Routes::new(entry, forwarder, upstream, &registry, passthrough)
    }

    #[test]
    fn test_fixed_route_set_registers() {
        assert!(build(&[]).is_ok());
    }

    #[test]
    fn test_operator_passthrough_registers() {
        assert!(build(&["/api/v1/labels".to_string()]).is_ok());
    }

    #[test]
    fn test_passthrough_shared_prefix_rejected() {
        let err = build(&["/api/v1/query/sub".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            RouteError::Registration(RegistrationError::Overlap { .. })
        ));
    }

    #[test]
    fn test_passthrough_root_disallowed() {
        let err = build(&["/".to_string()]).unwrap_err();
        assert!(matches!(err, RouteError::DisallowedPassthrough(_)));

        let err = build(&[String::new()]).unwrap_err();
        assert!(matches!(err, RouteError::DisallowedPassthrough(_)));
    }

    #[test]
    fn test_passthrough_must_match_canonical_form() {
        for path in ["/foo?bar", "/foo#frag", "relative", "/a b"] {
            let err = build(&[path.to_string()]).unwrap_err();
            assert!(
                matches!(err, RouteError::InvalidPassthrough(_)),
                "path {path:?}"
            );
        }
    }
}
