//! Typed query requests and their HTTP codecs.
//!
//! Instant and range requests are decoded once at ingress, travel the
//! stage chain as values, and are re-encoded into an outbound HTTP request
//! by the exit stage.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request};
use chrono::{DateTime, Utc};
use url::Url;

use crate::pipeline::error::PipelineError;

/// Bag of passthrough flags appended to the upstream URL.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Suppress appending any of the flags below to the URL.
    pub skip_upstream_params: bool,
    pub deduplicate: bool,
    pub partial_response: bool,
    pub max_source_resolution: String,
    pub engine: String,
    /// HTTP method override; empty means GET.
    pub method: String,
    /// Header overrides applied to the outbound request.
    pub http_headers: HeaderMap,
}

impl QueryOptions {
    /// Append the flags to a parameter list. Booleans are stringified
    /// lower-case; `max_source_resolution` is only emitted when set.
    pub fn add_to(&self, params: &mut Vec<(String, String)>) {
        params.push(("dedup".into(), self.deduplicate.to_string()));
        if !self.max_source_resolution.is_empty() {
            params.push((
                "max_source_resolution".into(),
                self.max_source_resolution.clone(),
            ));
        }
        params.push(("engine".into(), self.engine.clone()));
        params.push(("partial_response".into(), self.partial_response.to_string()));
    }
}

/// Query evaluated at a single point in time (/api/v1/query).
#[derive(Debug, Clone)]
pub struct InstantRequest {
    /// Base upstream URL the exit stage targets.
    pub base: Url,
    pub query: String,
    pub time: DateTime<Utc>,
    pub opts: QueryOptions,
}

/// Query evaluated over [start, end] with a step (/api/v1/query_range).
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub base: Url,
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
    pub opts: QueryOptions,
}

/// Decode an instant request from inbound HTTP.
pub fn instant_from_request(
    base: &Url,
    request: &Request<Body>,
) -> Result<InstantRequest, PipelineError> {
    let params = query_params(request);

    let query = required_param(&params, "query")?;
    let time = match params.get("time") {
        Some(raw) => parse_time(raw)
            .map_err(|e| PipelineError::Decode(format!("invalid 'time' value {raw:?}: {e}")))?,
        None => Utc::now(),
    };

    Ok(InstantRequest {
        base: base.clone(),
        query,
        time,
        opts: options_from_params(&params, request.method()),
    })
}

/// Decode a range request from inbound HTTP.
pub fn range_from_request(
    base: &Url,
    request: &Request<Body>,
) -> Result<RangeRequest, PipelineError> {
    let params = query_params(request);

    let query = required_param(&params, "query")?;
    let start = parse_time_param(&params, "start")?;
    let end = parse_time_param(&params, "end")?;
    let raw_step = params
        .get("step")
        .ok_or_else(|| PipelineError::Decode("missing required parameter 'step'".into()))?;
    let step = parse_duration(raw_step)
        .map_err(|e| PipelineError::Decode(format!("invalid 'step' value {raw_step:?}: {e}")))?;

    Ok(RangeRequest {
        base: base.clone(),
        query,
        start,
        end,
        step,
        opts: options_from_params(&params, request.method()),
    })
}

/// Re-encode an instant request for the upstream query endpoint.
pub fn request_from_instant(req: &InstantRequest) -> Result<Request<Body>, PipelineError> {
    let mut params = vec![
        ("query".to_string(), req.query.clone()),
        ("time".to_string(), req.time.to_rfc3339()),
    ];
    if !req.opts.skip_upstream_params {
        req.opts.add_to(&mut params);
    }

    build_upstream_request(&req.base, "/api/v1/query", params, &req.opts)
}

/// Re-encode a range request for the upstream range endpoint.
pub fn request_from_range(req: &RangeRequest) -> Result<Request<Body>, PipelineError> {
    let mut params = vec![
        ("query".to_string(), req.query.clone()),
        ("start".to_string(), req.start.to_rfc3339()),
        ("end".to_string(), req.end.to_rfc3339()),
        ("step".to_string(), req.step.as_secs_f64().to_string()),
    ];
    if !req.opts.skip_upstream_params {
        req.opts.add_to(&mut params);
    }

    build_upstream_request(&req.base, "/api/v1/query_range", params, &req.opts)
}

fn build_upstream_request(
    base: &Url,
    api_path: &str,
    params: Vec<(String, String)>,
    opts: &QueryOptions,
) -> Result<Request<Body>, PipelineError> {
    let mut url = base.clone();
    let path = format!("{}{}", base.path().trim_end_matches('/'), api_path);
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let method = if opts.method.is_empty() {
        Method::GET
    } else {
        Method::from_str(&opts.method)
            .map_err(|e| PipelineError::Encode(format!("invalid method {:?}: {e}", opts.method)))?
    };

    let mut request = Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(Body::empty())
        .map_err(|e| PipelineError::Encode(e.to_string()))?;

    for (name, value) in &opts.http_headers {
        request.headers_mut().insert(name.clone(), value.clone());
    }

    Ok(request)
}

/// Lift client-supplied passthrough flags out of the parameter bag.
fn options_from_params(params: &HashMap<String, String>, method: &Method) -> QueryOptions {
    QueryOptions {
        deduplicate: params.get("dedup").is_some_and(|v| v == "true"),
        partial_response: params
            .get("partial_response")
            .is_some_and(|v| v == "true"),
        max_source_resolution: params
            .get("max_source_resolution")
            .cloned()
            .unwrap_or_default(),
        engine: params.get("engine").cloned().unwrap_or_default(),
        method: method.as_str().to_string(),
        ..QueryOptions::default()
    }
}

fn query_params(request: &Request<Body>) -> HashMap<String, String> {
    let raw = request.uri().query().unwrap_or("");
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn required_param(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<String, PipelineError> {
    params
        .get(name)
        .cloned()
        .ok_or_else(|| PipelineError::Decode(format!("missing required parameter {name:?}")))
}

fn parse_time_param(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<DateTime<Utc>, PipelineError> {
    let raw = params
        .get(name)
        .ok_or_else(|| PipelineError::Decode(format!("missing required parameter {name:?}")))?;
    parse_time(raw)
        .map_err(|e| PipelineError::Decode(format!("invalid {name:?} value {raw:?}: {e}")))
}

/// Parse a Prometheus API timestamp: Unix seconds (possibly fractional)
/// or RFC 3339.
fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return Err(format!("timestamp {seconds} out of range"));
        }
        let secs = seconds.floor() as i64;
        let nanos = ((seconds - seconds.floor()) * 1e9).round() as u32;
        return DateTime::<Utc>::from_timestamp(secs, nanos)
            .ok_or_else(|| format!("timestamp {seconds} out of range"));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

/// Parse a Prometheus API duration: seconds as a float, or a duration
/// string such as "30s", "5m", "1h".
fn parse_duration(value: &str) -> Result<Duration, String> {
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("invalid duration {value:?}"));
        }
        return Ok(Duration::from_secs_f64(seconds));
    }

    // "ms" must be tried before the single-letter units.
    let (number, multiplier_ms) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1u64)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = value.strip_suffix('d') {
        (n, 86_400_000)
    } else {
        return Err(format!("unrecognized duration {value:?}"));
    };

    let count: u64 = number
        .parse()
        .map_err(|_| format!("unrecognized duration {value:?}"))?;
    Ok(Duration::from_millis(count.saturating_mul(multiplier_ms)))
}
