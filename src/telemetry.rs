//! OpenTelemetry span export and W3C trace-context propagation.
//!
//! With `APP_ENABLE_TRACE` set to any non-empty value, spans are batched
//! to an OTLP gRPC collector at `APP_TRACE_ENDPOINT`. Without it a
//! provider is still installed, so an inbound `traceparent` is joined
//! and passed on to the upstream even though nothing is exported.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::Span;
use tracing_opentelemetry::{OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::Registry;

use crate::error::GatewayError;

pub const DEFAULT_TRACE_ENDPOINT: &str = "127.0.0.1:4317";

/// Owns the tracer provider. Pending spans are flushed on drop.
pub struct Telemetry {
    provider: TracerProvider,
    tracer: Tracer,
}

impl Telemetry {
    pub fn init(
        service_name: &str,
        enable_trace: Option<&str>,
        endpoint: &str,
    ) -> Result<Self, GatewayError> {
        let resource = Resource::new([KeyValue::new("service.name", service_name.to_string())]);
        let mut builder = TracerProvider::builder().with_resource(resource);

        if export_enabled(enable_trace) {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(collector_url(endpoint))
                .build()
                .map_err(|e| GatewayError::Telemetry(e.to_string()))?;
            builder = builder.with_batch_exporter(exporter, runtime::Tokio);
        }

        let provider = builder.build();
        let tracer = provider.tracer(service_name.to_string());
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

        Ok(Self { provider, tracer })
    }

    /// `tracing` layer that turns spans into OpenTelemetry spans.
    #[must_use]
    pub fn layer(&self) -> OpenTelemetryLayer<Registry, Tracer> {
        tracing_opentelemetry::layer().with_tracer(self.tracer.clone())
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "failed to flush spans");
        }
    }
}

fn export_enabled(flag: Option<&str>) -> bool {
    flag.is_some_and(|v| !v.is_empty())
}

/// `host:port` gets a plain-text `http://` scheme.
fn collector_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

struct HeaderReader<'a>(&'a HeaderMap);

impl Extractor for HeaderReader<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

struct HeaderWriter<'a>(&'a mut HeaderMap);

impl Injector for HeaderWriter<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Make `span` a child of the trace named by the inbound headers, if any.
pub fn join_remote_parent(span: &Span, headers: &HeaderMap) {
    let parent =
        opentelemetry::global::get_text_map_propagator(|p| p.extract(&HeaderReader(headers)));
    span.set_parent(parent);
}

/// Write the current span's context into outbound headers.
pub fn inject_current(headers: &mut HeaderMap) {
    let context = Span::current().context();
    opentelemetry::global::get_text_map_propagator(|p| {
        p.inject_context(&context, &mut HeaderWriter(headers));
    });
}
