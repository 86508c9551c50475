//! Structured errors for the query pipeline.

use thiserror::Error;

use crate::http::forward::ForwardError;

/// Error produced while a typed request travels the stage chain.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage refused admission. `mw_type` is the stable tag of the
    /// refusing middleware and feeds the block-count metric label.
    #[error("request blocked by {mw_type} middleware")]
    Blocked { mw_type: &'static str },

    /// The typed request could not be decoded from HTTP.
    #[error("failed to decode request: {0}")]
    Decode(String),

    /// The outbound upstream request could not be constructed.
    #[error("failed to build upstream request: {0}")]
    Encode(String),

    /// The upstream hop itself failed.
    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl PipelineError {
    /// True when the error is an admission refusal rather than a failure.
    pub fn is_blocked(&self) -> bool {
        matches!(self, PipelineError::Blocked { .. })
    }
}

impl From<ForwardError> for PipelineError {
    fn from(err: ForwardError) -> Self {
        PipelineError::Upstream(err.0)
    }
}
