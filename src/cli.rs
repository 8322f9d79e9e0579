//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, health), and their associated argument structs.
//! Every flag has an environment variable equivalent for container
//! deployments; running without a subcommand starts the gateway.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "passway",
    version,
    about = "Path-routed HTTP gateway",
    propagate_version = true,
    args_conflicts_with_subcommands = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        APP_REAL_HOST_ALPHA=http://localhost:9001 passway   Route /alpha/* to port 9001\n  \
        passway health                                       Check a running instance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (default)
    Run(Box<RunArgs>),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Access --
    /// Comma-separated CIDR ranges that bypass the auth header check
    #[arg(
        long,
        env = "APP_INTERNAL_NETWORKS",
        default_value = crate::middleware::client_origin::DEFAULT_INTERNAL_NETWORKS,
        help_heading = "Access"
    )]
    pub internal_networks: String,

    /// Shared secret expected in `X-AI-Passway-Auth` (random when unset)
    #[arg(
        long,
        env = "APP_PUBLIC_AUTH_TOKEN",
        hide_env_values = true,
        help_heading = "Access"
    )]
    pub public_auth_token: Option<String>,

    // -- Upstream --
    /// Forward proxy for all outbound calls
    #[arg(long, env = "APP_FORWARD_PROXY_URL", help_heading = "Upstream")]
    pub forward_proxy_url: Option<String>,

    /// Seconds to wait for upstream response headers
    #[arg(long, env = "APP_HEADER_TIMEOUT", help_heading = "Upstream")]
    pub header_timeout: Option<String>,

    /// Seconds an upstream connection may stay idle
    #[arg(long, env = "APP_IDLE_TIMEOUT", help_heading = "Upstream")]
    pub idle_timeout: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Observability --
    /// Service name attached to request spans
    #[arg(
        long,
        env = "APP_SERVICE_NAME",
        default_value = "ai-passway",
        help_heading = "Observability"
    )]
    pub service_name: String,

    /// Export spans over OTLP gRPC when set to any non-empty value
    #[cfg(feature = "otel")]
    #[arg(long, env = "APP_ENABLE_TRACE", help_heading = "Observability")]
    pub enable_trace: Option<String>,

    /// OTLP gRPC collector address
    #[cfg(feature = "otel")]
    #[arg(
        long,
        env = "APP_TRACE_ENDPOINT",
        default_value = crate::telemetry::DEFAULT_TRACE_ENDPOINT,
        help_heading = "Observability"
    )]
    pub trace_endpoint: String,

    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "APP_SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "APP_SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8000")]
    pub url: String,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}
