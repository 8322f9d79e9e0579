//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared, read-only settings and TLS
//! roots), [`build_router`] for assembling the request pipeline, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use tracing::Span;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::health::{healthz, HEALTHZ_PATH};
use crate::middleware::{access_log, auth};
use crate::proxy;

pub struct AppState {
    pub settings: Settings,
    pub tls: rustls::ClientConfig,
}

impl AppState {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            tls: proxy::transport::tls_config(),
        }
    }
}

/// Health check first, then every other path through
/// authorization → access log → proxy.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(proxy::dynamic_proxy_handler)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    auth::public_auth,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    access_log::access_log,
                )),
        )
        // Added after the layers so it skips authorization and access logging
        .route(HEALTHZ_PATH, get(healthz))
        .layer(TraceLayer::new_for_http().make_span_with(http_span))
        .with_state(state)
}

/// Outermost span. Joins the caller's trace when `otel` is enabled.
fn http_span(request: &Request<Body>) -> Span {
    let span = tracing::info_span!(
        "http_request",
        http.method = %request.method(),
        http.target = %request.uri(),
    );
    #[cfg(feature = "otel")]
    crate::telemetry::join_remote_parent(&span, request.headers());
    span
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
