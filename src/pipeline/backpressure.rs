//! AIMD admission control.
//!
//! # Responsibilities
//! - Cap the number of in-flight queries at a dynamic watermark
//! - Grow the watermark additively on success, halve it on failure
//! - Probe backend health with PromQL queries in a background task
//!
//! # Design Decisions
//! - Refusals fail fast and never adjust the window; only outcomes of
//!   delegated calls do
//! - The mutex is never held across the downstream call
//! - A monitoring outage yields no signal rather than an unhealthy signal,
//!   so the window cannot collapse on a probe failure alone

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde::Deserialize;
use url::Url;

use crate::lifecycle::ShutdownListener;
use crate::pipeline::error::PipelineError;
use crate::pipeline::request::{InstantRequest, RangeRequest};
use crate::pipeline::QueryClient;

/// Stable tag carried by refusals from this stage.
pub const MW_TYPE: &str = "backpressure";

/// Cadence of the background health probe.
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Per-probe HTTP timeout; a slow monitoring endpoint must not stall the
/// probe loop for longer than its own cadence.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Congestion window state.
///
/// Invariants: `min >= 1`, `min <= watermark <= max`, `active >= 0`, and
/// every request past the gate pairs one increment of `active` with
/// exactly one decrement.
#[derive(Debug)]
struct CongestionState {
    min: u64,
    max: u64,
    watermark: u64,
    active: u64,
}

/// Shared controller core; the request path and the probe loop both adjust
/// the window through it.
struct Controller {
    state: Mutex<CongestionState>,
    queries: Vec<String>,
    monitoring_url: Url,
    probe: reqwest::Client,
}

impl Controller {
    /// Admit one request if the window has room. Admission charges
    /// `active`; refusal leaves all state untouched.
    fn try_admit(&self) -> bool {
        let mut state = self.lock();
        if state.active >= state.watermark {
            return false;
        }
        state.active += 1;
        true
    }

    /// Record the outcome of an admitted request and apply the window
    /// adjustment rule.
    fn complete(&self, success: bool) {
        let mut state = self.lock();
        state.active -= 1;
        if success {
            state.watermark = (state.watermark + 1).min(state.max);
        } else {
            state.watermark = (state.watermark / 2).max(state.min);
        }
    }

    /// Additive increase driven by a healthy probe tick.
    fn widen(&self) {
        let mut state = self.lock();
        state.watermark = (state.watermark + 1).min(state.max);
    }

    /// Multiplicative decrease driven by an unhealthy probe tick.
    fn narrow(&self) {
        let mut state = self.lock();
        state.watermark = (state.watermark / 2).max(state.min);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CongestionState> {
        self.state.lock().expect("congestion state mutex poisoned")
    }

    /// Evaluate every health query once and adjust the window.
    ///
    /// Any query returning samples is an unhealthy signal and narrows the
    /// window even if another query failed. Widening requires every query
    /// to answer with an empty result; probe failures yield no change.
    async fn probe_once(&self) {
        let mut unhealthy = false;
        let mut failed = false;

        for query in &self.queries {
            match self.eval_health_query(query).await {
                Ok(has_samples) => unhealthy = unhealthy || has_samples,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "health probe failed");
                    failed = true;
                }
            }
        }

        if unhealthy {
            tracing::debug!("backend under stress, narrowing congestion window");
            self.narrow();
        } else if !failed {
            self.widen();
        }
    }

    /// Returns true when the monitoring endpoint answers the query with a
    /// non-empty result vector.
    async fn eval_health_query(&self, query: &str) -> Result<bool, reqwest::Error> {
        let mut url = self.monitoring_url.clone();
        let path = format!(
            "{}/api/v1/query",
            self.monitoring_url.path().trim_end_matches('/')
        );
        url.set_path(&path);
        url.query_pairs_mut().clear().append_pair("query", query);

        let body: ProbeResponse = self
            .probe
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(!body.data.result.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    data: ProbeData,
}

#[derive(Debug, Deserialize)]
struct ProbeData {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

/// AIMD congestion-control stage.
pub struct Backpressure {
    client: Box<dyn QueryClient>,
    controller: Arc<Controller>,
}

impl Backpressure {
    /// Build the stage with a full window: admission starts optimistic and
    /// only narrows once the backend shows stress.
    pub fn new(
        client: Box<dyn QueryClient>,
        window_min: u64,
        window_max: u64,
        queries: Vec<String>,
        monitoring_url: Url,
    ) -> Self {
        Self {
            client,
            controller: Arc::new(Controller {
                state: Mutex::new(CongestionState {
                    min: window_min,
                    max: window_max,
                    watermark: window_max,
                    active: 0,
                }),
                queries,
                monitoring_url,
                probe: reqwest::Client::builder()
                    .timeout(PROBE_TIMEOUT)
                    .build()
                    .unwrap_or_default(),
            }),
        }
    }

    /// Start the background health probe. Runs until the shutdown signal
    /// fires.
    pub fn spawn_probe(&self, mut shutdown: ShutdownListener) {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROBE_INTERVAL);
            // The first tick fires immediately; skip it so a fresh process
            // serves traffic before its first probe verdict.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => controller.probe_once().await,
                    _ = shutdown.recv() => {
                        tracing::debug!("health probe stopped");
                        break;
                    }
                }
            }
        });
    }

    #[cfg(test)]
    fn snapshot(&self) -> (u64, u64) {
        let state = self.controller.lock();
        (state.watermark, state.active)
    }

    #[cfg(test)]
    fn set_watermark(&self, watermark: u64) {
        self.controller.lock().watermark = watermark;
    }
}

#[async_trait]
impl QueryClient for Backpressure {
    async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError> {
        if !self.controller.try_admit() {
            return Err(PipelineError::Blocked { mw_type: MW_TYPE });
        }

        let outcome = self.client.query_instant(req).await;
        self.controller.complete(outcome.is_ok());
        outcome
    }

    async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError> {
        if !self.controller.try_admit() {
            return Err(PipelineError::Blocked { mw_type: MW_TYPE });
        }

        let outcome = self.client.query_range(req).await;
        self.controller.complete(outcome.is_ok());
        outcome
    }
}
