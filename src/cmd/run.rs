//! `passway run`: start the gateway.
//!
//! Builds the immutable [`Settings`] from flags and environment, refuses
//! to start on a malformed internal network list, then serves until
//! SIGTERM / Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::Settings;
use crate::error::GatewayError;
use crate::logging;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    #[cfg(feature = "otel")]
    let telemetry = crate::telemetry::Telemetry::init(
        &args.service_name,
        args.enable_trace.as_deref(),
        &args.trace_endpoint,
    )?;
    #[cfg(feature = "otel")]
    let export = Some(telemetry.layer());
    #[cfg(not(feature = "otel"))]
    let export: Option<tracing_subscriber::layer::Identity> = None;
    logging::init(&args.log_level, log_format, export);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| {
            crate::sentry_integration::init(
                dsn,
                args.sentry_environment.as_deref(),
                &args.service_name,
            )
        });

    let settings = Settings::from_args(&args).inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration, refusing to start");
    })?;

    let service_count = settings.routes.len();
    let network_count = settings.internal_networks.len();
    let forward_proxy = settings.transport.forward_proxy.is_some();
    let service_name = settings.service_name.clone();

    let state = Arc::new(AppState::new(settings));
    let router = server::build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        service = %service_name,
        services = service_count,
        internal_networks = network_count,
        forward_proxy,
        "gateway started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("gateway stopped");
    Ok(())
}
