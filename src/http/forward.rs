//! Single-host reverse-proxy hop to the upstream backend.

use std::str::FromStr;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, Request, Uri};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use url::Url;

/// Error produced when the upstream hop cannot be completed.
#[derive(Debug, Error)]
#[error("upstream request failed: {0}")]
pub struct ForwardError(pub String);

/// Forwards requests to a single upstream host.
///
/// The forwarder performs the hop and streams the response back; it makes
/// no policy decisions. Admission control happens upstream of it in the
/// middleware pipeline.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
}

impl Forwarder {
    /// Create a forwarder for the given upstream URL.
    ///
    /// The URL must carry a host; the scheme must be `http` or `https`,
    /// which config validation guarantees.
    pub fn new(upstream: &Url) -> Result<Self, ForwardError> {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let host = upstream
            .host_str()
            .ok_or_else(|| ForwardError(format!("upstream URL {upstream} has no host")))?;
        let raw_authority = match upstream.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&raw_authority)
            .map_err(|e| ForwardError(format!("invalid upstream authority: {e}")))?;

        let scheme = if upstream.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };

        Ok(Self {
            client,
            scheme,
            authority,
        })
    }

    /// Rewrite an inbound request onto the upstream authority and perform
    /// the hop, keeping path and query intact.
    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response, ForwardError> {
        let mut parts = request.uri().clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }

        let uri = Uri::from_parts(parts)
            .map_err(|e| ForwardError(format!("URI rewrite failed: {e}")))?;
        *request.uri_mut() = uri;

        // Let the client regenerate Host for the upstream authority.
        request.headers_mut().remove(header::HOST);

        self.send(request).await
    }

    /// Perform the hop for a request that already targets the upstream.
    pub async fn send(&self, request: Request<Body>) -> Result<Response, ForwardError> {
        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) => Err(ForwardError(e.to_string())),
        }
    }
}
