//! Query middleware pipeline.
//!
//! # Data Flow
//! ```text
//! HTTP request (instant or range)
//!     → request.rs (decode into typed request)
//!     → Observer (count requests, errors, blocks, latency)
//!     → Jitterer (random pre-delay)
//!     → Backpressure (AIMD admission gate)
//!     → Exit (re-encode, hop to upstream via the forwarder)
//! ```
//!
//! # Design Decisions
//! - Stages compose as a chain of trait objects; disabled stages are
//!   simply omitted
//! - The chain is wrapped inside-out, Exit first, so the outermost stage
//!   is the pipeline entry
//! - Stages return the upstream response; nothing is written to the
//!   client until the chain unwinds

pub mod backpressure;
pub mod error;
pub mod exit;
pub mod jitter;
#[cfg(test)]
pub(crate) mod mock;
pub mod observer;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use prometheus::Registry;

use crate::config::schema::MiddlewareConfig;
use crate::config::validation::ValidationError;
use crate::http::Forwarder;
use crate::lifecycle::Shutdown;
use crate::pipeline::backpressure::Backpressure;
use crate::pipeline::error::PipelineError;
use crate::pipeline::exit::Exit;
use crate::pipeline::jitter::Jitterer;
use crate::pipeline::observer::Observer;
use crate::pipeline::request::{InstantRequest, RangeRequest};

/// A stage in the query middleware chain.
///
/// Each method consumes the typed request and either produces the
/// upstream response or a structured error.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError>;
    async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError>;
}

/// Entry point of the assembled pipeline.
pub struct Entry {
    client: Box<dyn QueryClient>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").finish_non_exhaustive()
    }
}

impl Entry {
    /// Assemble the stage chain from validated configuration.
    ///
    /// Stages wrap inside-out: Exit, then backpressure, jitter and
    /// observer when enabled. The backpressure probe task starts here and
    /// stops on the shutdown signal.
    pub fn from_config(
        cfg: &MiddlewareConfig,
        registry: Option<&Registry>,
        forwarder: Arc<Forwarder>,
        shutdown: &Shutdown,
    ) -> Result<Self, ValidationError> {
        cfg.validate()?;
        if cfg.enable_observer && registry.is_none() {
            return Err(ValidationError::RegistryRequired);
        }

        let mut client: Box<dyn QueryClient> = Box::new(Exit::new(forwarder));

        if cfg.enable_backpressure {
            // Validation guarantees a parseable URL here.
            let monitoring_url = url::Url::parse(&cfg.backpressure_monitoring_url)
                .map_err(|e| ValidationError::InvalidMonitoringUrl {
                    url: cfg.backpressure_monitoring_url.clone(),
                    reason: e.to_string(),
                })?;
            let stage = Backpressure::new(
                client,
                cfg.congestion_window_min,
                cfg.congestion_window_max,
                cfg.backpressure_queries.clone(),
                monitoring_url,
            );
            stage.spawn_probe(shutdown.subscribe());
            client = Box::new(stage);
        }

        if cfg.enable_jitter {
            client = Box::new(Jitterer::new(
                client,
                Duration::from_millis(cfg.jitter_delay_ms),
            ));
        }

        if cfg.enable_observer {
            let registry = registry.ok_or(ValidationError::RegistryRequired)?;
            client = Box::new(
                Observer::new(client, registry)
                    .map_err(|e| ValidationError::MetricsRegistration(e.to_string()))?,
            );
        }

        Ok(Self { client })
    }

    pub async fn query_instant(&self, req: InstantRequest) -> Result<Response, PipelineError> {
        self.client.query_instant(req).await
    }

    pub async fn query_range(&self, req: RangeRequest) -> Result<Response, PipelineError> {
        self.client.query_range(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> (Arc<Forwarder>, Shutdown) {
        let upstream = url::Url::parse("http://127.0.0.1:9090").unwrap();
        (Arc::new(Forwarder::new(&upstream).unwrap()), Shutdown::new())
    }

    #[tokio::test]
    async fn test_observer_requires_registry() {
        let (forwarder, shutdown) = deps();
        let cfg = MiddlewareConfig {
            enable_observer: true,
            ..MiddlewareConfig::default()
        };

        let err = Entry::from_config(&cfg, None, forwarder, &shutdown).unwrap_err();
        assert!(matches!(err, ValidationError::RegistryRequired));
    }

    #[tokio::test]
    async fn test_full_chain_assembles() {
        let (forwarder, shutdown) = deps();
        let registry = Registry::new();
        let cfg = MiddlewareConfig {
            enable_backpressure: true,
            backpressure_monitoring_url: "http://127.0.0.1:9090".into(),
            backpressure_queries: vec!["up == 0".into()],
            congestion_window_min: 1,
            congestion_window_max: 10,
            enable_jitter: true,
            jitter_delay_ms: 1,
            enable_observer: true,
        };

        assert!(Entry::from_config(&cfg, Some(&registry), forwarder, &shutdown).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_assembly() {
        let (forwarder, shutdown) = deps();
        let cfg = MiddlewareConfig {
            enable_backpressure: true,
            ..MiddlewareConfig::default()
        };

        let err = Entry::from_config(&cfg, None, forwarder, &shutdown).unwrap_err();
        assert!(matches!(err, ValidationError::BackpressureQueryRequired));
    }
}
