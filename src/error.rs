//! Unified error types for Passway.
//!
//! [`GatewayError`] covers process-level failures (startup configuration,
//! binding, the `health` check). [`RequestError`] is the per-request
//! taxonomy: every variant maps to exactly one status code and renders
//! with an empty body, so no failure detail reaches the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Invalid internal network '{entry}': {source}")]
    InvalidNetwork {
        entry: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("service key not found in path")]
    NoServiceKey,

    #[error("service not found: {0}")]
    UnknownService(String),

    #[error("dot segment in forwarded path: {0}")]
    DotSegment(String),

    #[error("unauthorized access from {client_ip}")]
    Unauthorized { client_ip: String },

    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("invalid forward proxy url '{url}': {reason}")]
    InvalidForwardProxy { url: String, reason: String },

    #[error("upstream request failed: {source}")]
    UpstreamTransport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("upstream did not send response headers within {0:?}")]
    UpstreamTimeout(std::time::Duration),
}

impl RequestError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NoServiceKey | Self::UnknownService(_) | Self::DotSegment(_) => {
                StatusCode::NOT_IMPLEMENTED
            }
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::InvalidUpstreamUrl { .. } | Self::InvalidForwardProxy { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamTransport { .. } | Self::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_failures_are_not_implemented() {
        assert_eq!(RequestError::NoServiceKey.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            RequestError::UnknownService("nope".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            RequestError::DotSegment("/alpha/../x".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn configuration_failures_are_internal() {
        let err = RequestError::InvalidForwardProxy {
            url: "::".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        let err = RequestError::UpstreamTimeout(std::time::Duration::from_secs(60));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err = RequestError::UpstreamTransport {
            source: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn responses_have_empty_bodies() {
        use http_body_util::BodyExt;

        let response = RequestError::Unauthorized {
            client_ip: "203.0.113.5".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
