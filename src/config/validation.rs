//! Configuration validation logic.

use thiserror::Error;
use url::Url;

use crate::config::schema::{MiddlewareConfig, ProxyConfig};

/// Error type for configuration validation failures.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("upstream URL is required")]
    UpstreamRequired,

    #[error("upstream URL {url:?} is not valid: {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("unsupported scheme {scheme:?} for upstream URL, only 'http' and 'https' are supported")]
    UnsupportedUpstreamScheme { scheme: String },

    #[error("jitter delay must be greater than zero when jitter is enabled")]
    JitterDelayRequired,

    #[error("at least one health query is required when backpressure is enabled")]
    BackpressureQueryRequired,

    #[error("health query {query:?} is not valid PromQL: {reason}")]
    InvalidHealthQuery { query: String, reason: String },

    #[error("monitoring URL is required when backpressure is enabled")]
    MonitoringUrlRequired,

    #[error("monitoring URL {url:?} is not valid: {reason}")]
    InvalidMonitoringUrl { url: String, reason: String },

    #[error("congestion window minimum must be at least 1")]
    CongestionWindowMinBelowOne,

    #[error("congestion window maximum must not be below the minimum")]
    CongestionWindowMaxBelowMin,

    #[error("a metrics registry is required when the observer is enabled")]
    RegistryRequired,

    #[error("failed to register metrics: {0}")]
    MetricsRegistration(String),
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), ValidationError> {
    parse_upstream_url(&config.upstream.url)?;
    config.middleware.validate()
}

/// Parse the upstream URL, rejecting anything that is not plain HTTP(S).
pub fn parse_upstream_url(raw: &str) -> Result<Url, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::UpstreamRequired);
    }

    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidUpstreamUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedUpstreamScheme {
            scheme: other.to_string(),
        }),
    }
}

impl MiddlewareConfig {
    /// Check the pipeline settings before any stage is constructed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enable_jitter && self.jitter_delay_ms == 0 {
            return Err(ValidationError::JitterDelayRequired);
        }

        if self.enable_backpressure {
            if self.backpressure_queries.is_empty() {
                return Err(ValidationError::BackpressureQueryRequired);
            }
            for query in &self.backpressure_queries {
                promql_parser::parser::parse(query).map_err(|reason| {
                    ValidationError::InvalidHealthQuery {
                        query: query.clone(),
                        reason,
                    }
                })?;
            }

            if self.backpressure_monitoring_url.is_empty() {
                return Err(ValidationError::MonitoringUrlRequired);
            }
            Url::parse(&self.backpressure_monitoring_url).map_err(|e| {
                ValidationError::InvalidMonitoringUrl {
                    url: self.backpressure_monitoring_url.clone(),
                    reason: e.to_string(),
                }
            })?;

            if self.congestion_window_min < 1 {
                return Err(ValidationError::CongestionWindowMinBelowOne);
            }
            if self.congestion_window_max < self.congestion_window_min {
                return Err(ValidationError::CongestionWindowMaxBelowMin);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backpressure_config() -> MiddlewareConfig {
        MiddlewareConfig {
            enable_backpressure: true,
            backpressure_monitoring_url: "http://127.0.0.1:9090".into(),
            backpressure_queries: vec!["sum(rate(http_requests_total[5m])) > 100".into()],
            congestion_window_min: 1,
            congestion_window_max: 10,
            ..MiddlewareConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = ProxyConfig::default();
        assert!(validate_config(&config).is_ok());

        assert!(backpressure_config().validate().is_ok());
    }

    #[test]
    fn test_upstream_scheme_rejected() {
        let mut config = ProxyConfig::default();
        config.upstream.url = "ftp://example.com".into();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::UnsupportedUpstreamScheme { .. })
        ));

        config.upstream.url = String::new();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::UpstreamRequired)
        ));
    }

    #[test]
    fn test_jitter_delay_required() {
        let config = MiddlewareConfig {
            enable_jitter: true,
            jitter_delay_ms: 0,
            ..MiddlewareConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::JitterDelayRequired)
        ));
    }

    #[test]
    fn test_backpressure_requires_queries() {
        let mut config = backpressure_config();
        config.backpressure_queries.clear();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::BackpressureQueryRequired)
        ));
    }

    #[test]
    fn test_invalid_health_query_rejected() {
        let mut config = backpressure_config();
        config.backpressure_queries.push("sum(rate(".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidHealthQuery { .. })
        ));
    }

    #[test]
    fn test_monitoring_url_required() {
        let mut config = backpressure_config();
        config.backpressure_monitoring_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MonitoringUrlRequired)
        ));
    }

    #[test]
    fn test_window_bounds() {
        let mut config = backpressure_config();
        config.congestion_window_min = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CongestionWindowMinBelowOne)
        ));

        let mut config = backpressure_config();
        config.congestion_window_max = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CongestionWindowMaxBelowMin)
        ));
    }
}
