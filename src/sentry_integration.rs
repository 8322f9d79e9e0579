//! Optional Sentry error tracking.
//!
//! The guard returned by [`init`] flushes pending events on drop, so
//! `run` holds it until the gateway stops.

pub fn init(dsn: &str, environment: Option<&str>, service_name: &str) -> sentry::ClientInitGuard {
    let parsed_dsn = dsn
        .parse::<sentry::types::Dsn>()
        .inspect_err(|e| tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled"))
        .ok();

    sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        server_name: Some(service_name.to_string().into()),
        release: Some(concat!("passway@", env!("CARGO_PKG_VERSION")).into()),
        ..Default::default()
    })
}
