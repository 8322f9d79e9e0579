//! Core HTTP request forwarding handler.
//!
//! The [`dynamic_proxy_handler`] function is the Axum fallback that
//! receives every non-health request, resolves the service key from the
//! first path segment, and forwards the request to exactly one backend.
//! Submodules handle route resolution ([`routing`]), header rewriting
//! ([`headers`]), and the upstream client ([`transport`]).

pub mod headers;
pub mod routing;
pub mod transport;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Version;
use axum::response::{IntoResponse, Response};
use tracing::field::{display, Empty};
use tracing::{Instrument, Span};

use crate::error::RequestError;
use crate::server::AppState;
use transport::UpstreamClient;

pub async fn dynamic_proxy_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Response {
    let span = tracing::info_span!(
        "dynamic_proxy",
        service.key = Empty,
        proxy.base_url = Empty,
        proxy.full_url = Empty,
        otel.status_code = Empty,
        error = Empty,
    );

    match forward(&state, request).instrument(span.clone()).await {
        Ok(response) => response,
        Err(e) => {
            span.record("otel.status_code", "ERROR");
            span.record("error", display(&e));
            span.in_scope(|| {
                if e.status().is_server_error() {
                    tracing::error!(error = %e, status = e.status().as_u16(), "proxy error");
                } else {
                    tracing::warn!(error = %e, status = e.status().as_u16(), "request not routed");
                }
            });
            e.into_response()
        }
    }
}

async fn forward(state: &AppState, request: Request) -> Result<Response, RequestError> {
    let (mut parts, body) = request.into_parts();

    let route = routing::resolve(&state.settings.routes, parts.uri.path(), parts.uri.query())?;
    let span = Span::current();
    span.record("service.key", route.service_key.as_str());
    span.record("proxy.base_url", route.base_url.as_str());
    span.record("proxy.full_url", display(&route.target));
    tracing::info!(
        target_url = %route.target,
        forwarded_path = %route.forwarded_path,
        "proxying request"
    );

    let client = UpstreamClient::build(&state.settings.transport, &state.tls)?;

    headers::rewrite_request_headers(&mut parts.headers, &route.host);
    #[cfg(feature = "otel")]
    crate::telemetry::inject_current(&mut parts.headers);
    parts.uri = route.target;
    // The client negotiates h2 itself via ALPN
    parts.version = Version::HTTP_11;
    parts.extensions.clear();

    let call = client.request(Request::from_parts(parts, body));
    let result = match state.settings.transport.header_timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RequestError::UpstreamTimeout(limit))?,
        None => call.await,
    };
    let response = result.map_err(|e| RequestError::UpstreamTransport {
        source: Box::new(e),
    })?;

    let (mut parts, incoming) = response.into_parts();
    headers::strip_response_hop_by_hop(&mut parts.headers);
    parts.version = Version::HTTP_11;
    Ok(Response::from_parts(parts, Body::new(incoming)))
}
