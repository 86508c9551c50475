//! Closure-backed stage for unit tests.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use url::Url;

use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{InstantRequest, QueryOptions, RangeRequest};
use crate::pipeline::QueryClient;

type StageOutcome = Result<Response, PipelineError>;
type StageFuture = Pin<Box<dyn Future<Output = StageOutcome> + Send>>;

/// Mocks the stage contract so tests can script the downstream outcome.
pub(crate) struct Mocker {
    instant_fn: Box<dyn Fn(InstantRequest) -> StageFuture + Send + Sync>,
    range_fn: Box<dyn Fn(RangeRequest) -> StageFuture + Send + Sync>,
}

impl Mocker {
    /// Script synchronous outcomes for both query types.
    pub(crate) fn new(
        instant: impl Fn(InstantRequest) -> StageOutcome + Send + Sync + 'static,
        range: impl Fn(RangeRequest) -> StageOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            instant_fn: Box::new(move |req| {
                let outcome = instant(req);
                Box::pin(async move { outcome })
            }),
            range_fn: Box::new(move |req| {
                let outcome = range(req);
                Box::pin(async move { outcome })
            }),
        }
    }

    /// Script asynchronous outcomes, e.g. requests that park until a test
    /// releases them.
    pub(crate) fn new_async(
        instant: impl Fn(InstantRequest) -> StageFuture + Send + Sync + 'static,
        range: impl Fn(RangeRequest) -> StageFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            instant_fn: Box::new(instant),
            range_fn: Box::new(range),
        }
    }
}

#[async_trait]
impl QueryClient for Mocker {
    async fn query_instant(&self, req: InstantRequest) -> StageOutcome {
        (self.instant_fn)(req).await
    }

    async fn query_range(&self, req: RangeRequest) -> StageOutcome {
        (self.range_fn)(req).await
    }
}

pub(crate) fn ok_response() -> Response {
    Response::new(Body::empty())
}

pub(crate) fn instant_request() -> InstantRequest {
    InstantRequest {
        base: Url::parse("http://127.0.0.1:9090").expect("static URL"),
        query: "up".into(),
        time: Utc.timestamp_opt(0, 0).single().expect("epoch timestamp"),
        opts: QueryOptions::default(),
    }
}

pub(crate) fn range_request() -> RangeRequest {
    let base = instant_request();
    RangeRequest {
        base: base.base,
        query: base.query,
        start: base.time,
        end: base.time,
        step: std::time::Duration::from_secs(1),
        opts: QueryOptions::default(),
    }
}
