//! Per-request access logging.
//!
//! [`access_log`] opens the request span, runs the rest of the chain, and
//! wraps the response body in an [`AccessLogBody`] that counts bytes as
//! the server polls frames. The access line is written once, when that
//! body is dropped, so streamed responses are measured end to end.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use tracing::field::Empty;
use tracing::{Instrument, Span};

use crate::server::AppState;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Render a byte count with a 1024 divisor and two decimals. Negative
/// (unknown) lengths render as `-`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(n: i64) -> String {
    if n < 0 {
        return "-".to_string();
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

/// Declared request body length: `Content-Length`, `-1` for chunked
/// bodies, `0` when there is no body.
fn request_content_length(headers: &HeaderMap) -> i64 {
    if let Some(len) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        return len;
    }
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return -1;
    }
    0
}

#[derive(Debug)]
struct AccessRecord {
    remote_addr: String,
    method: String,
    uri: String,
    content_length: i64,
    status: u16,
    start: Instant,
}

impl AccessRecord {
    fn emit(&self, bytes_written: u64, elapsed: Duration, span: &Span) {
        tracing::info!(
            parent: span,
            remote_addr = %self.remote_addr,
            method = %self.method,
            uri = %self.uri,
            request_size = %format_bytes(self.content_length),
            duration = ?elapsed,
            status = self.status,
            response_size = %format_bytes(i64::try_from(bytes_written).unwrap_or(i64::MAX)),
            "request completed"
        );
    }
}

/// Response body decorator that counts bytes written.
pub struct AccessLogBody {
    inner: Body,
    bytes_written: u64,
    record: Option<AccessRecord>,
    span: Span,
}

impl AccessLogBody {
    fn new(inner: Body, record: Option<AccessRecord>, span: Span) -> Self {
        Self {
            inner,
            bytes_written: 0,
            record,
            span,
        }
    }
}

impl http_body::Body for AccessLogBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &polled {
            if let Some(data) = frame.data_ref() {
                this.bytes_written += data.len() as u64;
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for AccessLogBody {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            record.emit(self.bytes_written, record.start.elapsed(), &self.span);
        }
    }
}

/// Axum middleware emitting one access line per request.
pub async fn access_log(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |ConnectInfo(addr)| addr.to_string());
    let method = request.method().to_string();
    let uri = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
    let content_length = request_content_length(request.headers());

    let span = tracing::info_span!(
        "request",
        otel.name = %format!("{method}#{}", request.uri().path()),
        otel.kind = "server",
        service.name = %state.settings.service_name,
        request.uri = %uri,
        request.remote_addr = %remote_addr,
        request.content_length = content_length,
        status.code = Empty,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    span.record("status.code", status);

    let record = AccessRecord {
        remote_addr,
        method,
        uri,
        content_length,
        status,
        start,
    };
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(AccessLogBody::new(body, Some(record), span)))
}
