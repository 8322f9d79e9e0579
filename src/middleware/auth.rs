//! Public-access authorization gate.
//!
//! Callers inside an internal network pass straight through. Everyone
//! else must present the shared token in `X-AI-Passway-Auth`; a missing
//! or wrong value ends the request with an empty `401`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::field::Empty;

use super::client_origin::{client_ip, InternalNetworks};
use crate::error::RequestError;
use crate::server::AppState;

pub const AUTH_HEADER: &str = "x-ai-passway-auth";

/// Shared secret for external callers. `Debug` never prints the value.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Use the configured token, or generate a random one and say so.
    #[must_use]
    pub fn from_config(configured: Option<&str>) -> Self {
        match configured.filter(|t| !t.is_empty()) {
            Some(token) => Self::new(token),
            None => {
                let token = uuid::Uuid::new_v4().to_string();
                tracing::warn!(token = %token, "public auth token is not set, using random token");
                Self(token)
            }
        }
    }

    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Internal,
    External,
}

impl Access {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// Decide whether a caller may proceed.
pub fn authorize(
    networks: &InternalNetworks,
    token: &AuthToken,
    client_ip: &str,
    headers: &HeaderMap,
) -> Result<Access, RequestError> {
    if networks.is_internal(client_ip) {
        tracing::info!(client_ip, "internal access");
        return Ok(Access::Internal);
    }

    let presented = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !token.matches(presented) {
        tracing::warn!(client_ip, auth_header = presented, "unauthorized access");
        return Err(RequestError::Unauthorized {
            client_ip: client_ip.to_string(),
        });
    }

    tracing::info!(client_ip, "external access");
    Ok(Access::External)
}

/// Axum middleware wrapping [`authorize`]. The span covers only the
/// decision, not the downstream stages.
pub async fn public_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let span = tracing::info_span!("public_auth", client.ip = Empty, access = Empty);
    let decision = span.in_scope(|| {
        let ip = client_ip(request.headers(), remote);
        span.record("client.ip", ip.as_str());
        let decision = authorize(
            &state.settings.internal_networks,
            &state.settings.auth_token,
            &ip,
            request.headers(),
        );
        match &decision {
            Ok(access) => span.record("access", access.as_str()),
            Err(_) => span.record("access", "denied"),
        };
        decision
    });
    drop(span);

    match decision {
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
