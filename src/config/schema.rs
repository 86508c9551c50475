//! Configuration schema definitions.
//!
//! One section per concern: where to listen, which upstream to shield,
//! how the middleware pipeline is shaped (backpressure window, jitter,
//! observer), which paths bypass the pipeline, and request timeouts.
//! Every section defaults so a config file only needs the parts it
//! changes; semantic checks live in `validation.rs`, not here.

use serde::{Deserialize, Serialize};

/// Root configuration for the query proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind addresses).
    pub listener: ListenerConfig,

    /// Upstream query backend.
    pub upstream: UpstreamConfig,

    /// Middleware pipeline settings.
    pub middleware: MiddlewareConfig,

    /// Paths forwarded to upstream without traversing the pipeline.
    pub passthrough: PassthroughConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address for the proxy itself (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional bind address for the internal metrics endpoint.
    /// Empty disables the internal listener.
    pub internal_bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            internal_bind_address: String::new(),
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// URL of the Prometheus-compatible query API to proxy to.
    /// Only `http` and `https` schemes are supported.
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9090".to_string(),
        }
    }
}

/// Middleware pipeline configuration.
///
/// Disabled stages are omitted from the chain entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Enable the AIMD congestion-control stage.
    pub enable_backpressure: bool,

    /// Endpoint queried for backend health signals (not the data-plane
    /// upstream).
    pub backpressure_monitoring_url: String,

    /// PromQL expressions evaluated against the monitoring endpoint. An
    /// empty result vector means healthy; any sample means the backend is
    /// under stress.
    pub backpressure_queries: Vec<String>,

    /// Minimum concurrent queries to pass through regardless of spikes in
    /// backpressure.
    pub congestion_window_min: u64,

    /// Maximum concurrent queries to pass through regardless of backend
    /// health.
    pub congestion_window_max: u64,

    /// Enable the jitter stage.
    pub enable_jitter: bool,

    /// Upper bound for the random per-request delay in milliseconds.
    pub jitter_delay_ms: u64,

    /// Enable the observer stage (request/error/block/latency counters).
    pub enable_observer: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            enable_backpressure: false,
            backpressure_monitoring_url: String::new(),
            backpressure_queries: Vec::new(),
            congestion_window_min: 0,
            congestion_window_max: 0,
            enable_jitter: false,
            jitter_delay_ms: 1000,
            enable_observer: false,
        }
    }
}

/// Operator-supplied passthrough allow-list.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PassthroughConfig {
    /// Exact HTTP path segments forwarded to upstream without enforcement.
    /// "All" matching paths like "/" or "" and regex are not allowed.
    pub paths: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}
