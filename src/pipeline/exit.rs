//! Terminal pipeline stage.
//!
//! Turns the typed request back into an outbound HTTP request and hands it
//! to the reverse-proxy forwarder. Exit never blocks on policy; it only
//! performs translation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use crate::http::Forwarder;
use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{
    request_from_instant, request_from_range, InstantRequest, RangeRequest,
};
use crate::pipeline::QueryClient;

/// The innermost stage of every chain.
pub struct Exit {
    forwarder: Arc<Forwarder>,
}

impl Exit {
    pub fn new(forwarder: Arc<Forwarder>) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl QueryClient for Exit {
    async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError> {
        let outbound = request_from_instant(&req)?;
        Ok(self.forwarder.send(outbound).await?)
    }

    async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError> {
        let outbound = request_from_range(&req)?;
        Ok(self.forwarder.send(outbound).await?)
    }
}
