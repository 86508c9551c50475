//! Observer stage.
//!
//! Wraps the next stage and counts requests, errors, admission blocks and
//! cumulative latency per query type. The observer never alters the
//! request or the outcome; it is purely passive.

use std::time::Instant;

use async_trait::async_trait;
use axum::response::Response;
use prometheus::{CounterVec, Opts, Registry};

use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{InstantRequest, RangeRequest};
use crate::pipeline::QueryClient;

const REQ_COUNT_METRIC: &str = "querymw_request_count";
const ERR_COUNT_METRIC: &str = "querymw_error_count";
const BLOCK_COUNT_METRIC: &str = "querymw_block_count";
const LATENCY_METRIC: &str = "querymw_request_latency_ms";

pub struct Observer {
    client: Box<dyn QueryClient>,

    req_counter: CounterVec,
    err_counter: CounterVec,
    block_counter: CounterVec,
    latency_counter: CounterVec,
}

impl Observer {
    pub fn new(client: Box<dyn QueryClient>, registry: &Registry) -> Result<Self, prometheus::Error> {
        let req_counter = CounterVec::new(
            Opts::new(REQ_COUNT_METRIC, "Requests entering the query pipeline."),
            &["query_type"],
        )?;
        let err_counter = CounterVec::new(
            Opts::new(ERR_COUNT_METRIC, "Requests that failed downstream."),
            &["query_type"],
        )?;
        let block_counter = CounterVec::new(
            Opts::new(BLOCK_COUNT_METRIC, "Requests refused admission by a stage."),
            &["query_type", "mw_type"],
        )?;
        let latency_counter = CounterVec::new(
            Opts::new(LATENCY_METRIC, "Cumulative request latency in milliseconds."),
            &["query_type"],
        )?;

        registry.register(Box::new(req_counter.clone()))?;
        registry.register(Box::new(err_counter.clone()))?;
        registry.register(Box::new(block_counter.clone()))?;
        registry.register(Box::new(latency_counter.clone()))?;

        Ok(Self {
            client,
            req_counter,
            err_counter,
            block_counter,
            latency_counter,
        })
    }

    fn record(
        &self,
        outcome: &Result<Response, PipelineError>,
        started: Instant,
        query_type: &str,
    ) {
        if let Err(err) = outcome {
            match err {
                PipelineError::Blocked { mw_type } => {
                    self.block_counter
                        .with_label_values(&[query_type, *mw_type])
                        .inc();
                }
                _ => {
                    self.err_counter.with_label_values(&[query_type]).inc();
                }
            }
        }

        self.req_counter.with_label_values(&[query_type]).inc();
        self.latency_counter
            .with_label_values(&[query_type])
            .inc_by(started.elapsed().as_millis() as f64);
    }
}

#[async_trait]
impl QueryClient for Observer {
    async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError> {
        let started = Instant::now();
        let outcome = self.client.query_instant(req).await;
        self.record(&outcome, started, "instant");
        outcome
    }

    async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError> {
        let started = Instant::now();
        let outcome = self.client.query_range(req).await;
        self.record(&outcome, started, "range");
        outcome
    }
}
