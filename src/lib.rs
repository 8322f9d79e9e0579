//! Passway is a path-routed HTTP gateway.
//!
//! Each request's first path segment names a backend service; the
//! gateway looks up that service's base URL, rewrites the request, and
//! streams it to exactly one upstream. Callers outside the configured
//! internal networks must present a shared secret header.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, health).
//! - [`config`] -- Immutable startup settings and the service route table.
//! - [`error`] -- Process and per-request error types using `thiserror`.
//! - [`health`] -- `GET /-/healthz` liveness endpoint.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`middleware`] -- Authorization gate, client classification, and access log.
//! - [`proxy`] -- Route resolution, header rewriting, and the upstream transport.
//! - [`server`] -- Axum router assembly, shared state, and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sentry-integration` | Sentry error tracking |
//! | `otel` | OTLP span export and `traceparent` propagation |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod server;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
#[cfg(feature = "otel")]
pub mod telemetry;
