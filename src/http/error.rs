//! JSON error envelope for the query API surface.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// The `errorType` tag carried by every error envelope.
const ERROR_TYPE: &str = "prom-label-proxy";

/// Build a Prometheus-style JSON error response.
///
/// The envelope shape is part of the API contract:
/// `{"status":"error","errorType":"prom-label-proxy","error":<message>}`.
pub fn prometheus_api_error(message: String, code: StatusCode) -> Response {
    let body = serde_json::json!({
        "status": "error",
        "errorType": ERROR_TYPE,
        "error": message,
    });

    (
        code,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let response = prometheus_api_error("boom".into(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            response
                .headers()
                .get(header::X_CONTENT_TYPE_OPTIONS)
                .unwrap(),
            "nosniff"
        );
    }
}
