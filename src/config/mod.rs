//! Process configuration.
//!
//! [`Settings`] is assembled once from the parsed CLI/environment before
//! the listener starts and is never mutated afterwards. It bundles the
//! service route table ([`routes`]), the internal network allow-list, the
//! shared auth token, and the upstream transport settings.

pub mod routes;

use std::time::Duration;

use crate::cli::RunArgs;
use crate::error::GatewayError;
use crate::middleware::auth::AuthToken;
use crate::middleware::client_origin::InternalNetworks;
use crate::proxy::transport::TransportSettings;
use routes::ServiceRoutes;

pub const DEFAULT_HEADER_TIMEOUT_SECS: i64 = 60;
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 600;

#[derive(Debug, Clone)]
pub struct Settings {
    pub routes: ServiceRoutes,
    pub internal_networks: InternalNetworks,
    pub auth_token: AuthToken,
    pub transport: TransportSettings,
    pub service_name: String,
}

impl Settings {
    /// Build settings from CLI arguments plus the `APP_REAL_HOST_*`
    /// environment. Fails only on a malformed internal network list.
    pub fn from_args(args: &RunArgs) -> Result<Self, GatewayError> {
        Self::with_routes(args, ServiceRoutes::from_env())
    }

    pub fn with_routes(args: &RunArgs, routes: ServiceRoutes) -> Result<Self, GatewayError> {
        let internal_networks = InternalNetworks::parse(&args.internal_networks)?;
        let auth_token = AuthToken::from_config(args.public_auth_token.as_deref());

        let transport = TransportSettings {
            forward_proxy: args
                .forward_proxy_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from),
            header_timeout: seconds(int_setting(
                "APP_HEADER_TIMEOUT",
                args.header_timeout.as_deref(),
                DEFAULT_HEADER_TIMEOUT_SECS,
            )),
            idle_timeout: seconds(int_setting(
                "APP_IDLE_TIMEOUT",
                args.idle_timeout.as_deref(),
                DEFAULT_IDLE_TIMEOUT_SECS,
            )),
        };

        Ok(Self {
            routes,
            internal_networks,
            auth_token,
            transport,
            service_name: args.service_name.clone(),
        })
    }
}

/// Parse an integer tunable. Missing or blank input yields `default`;
/// unparsable input is logged and also yields `default`.
#[must_use]
pub fn int_setting(name: &str, raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(setting = name, value = raw, error = %e, "invalid integer setting, using default");
            default
        }
    }
}

/// Non-positive values disable the timeout.
fn seconds(value: i64) -> Option<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
