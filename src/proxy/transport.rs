//! Upstream HTTP transport.
//!
//! A fresh [`UpstreamClient`] is built for every proxied request from the
//! immutable [`TransportSettings`]: no connection pooling, optional idle
//! timeout, and an optional HTTP forward proxy reached with `CONNECT`.
//! TLS roots are loaded once at startup by [`tls_config`] and cloned in.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, Uri};
use base64::Engine as _;
use hyper::body::Incoming;
use hyper_rustls::ConfigBuilderExt;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;

use crate::error::RequestError;

pub type DirectConnector = hyper_rustls::HttpsConnector<HttpConnector>;
pub type TunnelConnector = hyper_rustls::HttpsConnector<ProxyTunnel>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    /// Raw forward proxy URL; validated per request.
    pub forward_proxy: Option<String>,
    /// Maximum wait for upstream response headers.
    pub header_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ForwardProxy {
    pub uri: Uri,
    pub authorization: Option<HeaderValue>,
}

/// Validate a forward proxy URL. Only plain `http` proxies are
/// supported; credentials become a Basic `Proxy-Authorization`.
pub fn parse_forward_proxy(raw: &str) -> Result<ForwardProxy, RequestError> {
    let invalid = |reason: String| RequestError::InvalidForwardProxy {
        url: redact(raw),
        reason,
    };

    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".into()))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let uri: Uri = format!("http://{host}:{port}")
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;

    let authorization = if url.username().is_empty() {
        None
    } else {
        let credentials = format!("{}:{}", url.username(), url.password().unwrap_or_default());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        let value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| invalid(e.to_string()))?;
        Some(value)
    };

    Ok(ForwardProxy { uri, authorization })
}

/// Mask the password of a proxy URL for logs.
fn redact(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

/// Load webpki roots into a client TLS config.
#[must_use]
pub fn tls_config() -> rustls::ClientConfig {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    rustls::ClientConfig::builder()
        .with_webpki_roots()
        .with_no_client_auth()
}

pub enum UpstreamClient {
    Direct(Client<DirectConnector, Body>),
    Tunneled(Client<TunnelConnector, Body>),
}

impl UpstreamClient {
    pub fn build(
        settings: &TransportSettings,
        tls: &rustls::ClientConfig,
    ) -> Result<Self, RequestError> {
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(settings.idle_timeout);

        match settings.forward_proxy.as_deref() {
            None => {
                let mut http = HttpConnector::new();
                http.enforce_http(false);
                let https = hyper_rustls::HttpsConnectorBuilder::new()
                    .with_tls_config(tls.clone())
                    .https_or_http()
                    .enable_http1()
                    .enable_http2()
                    .wrap_connector(http);
                Ok(Self::Direct(builder.build(https)))
            }
            Some(raw) => {
                let tunnel = ProxyTunnel {
                    proxy: parse_forward_proxy(raw)?,
                    http: HttpConnector::new(),
                };
                let https = hyper_rustls::HttpsConnectorBuilder::new()
                    .with_tls_config(tls.clone())
                    .https_or_http()
                    .enable_http1()
                    .enable_http2()
                    .wrap_connector(tunnel);
                Ok(Self::Tunneled(builder.build(https)))
            }
        }
    }

    pub async fn request(
        &self,
        req: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        match self {
            Self::Direct(client) => client.request(req).await,
            Self::Tunneled(client) => client.request(req).await,
        }
    }
}

/// Connector that reaches every destination through an HTTP `CONNECT`
/// tunnel on the forward proxy.
#[derive(Debug, Clone)]
pub struct ProxyTunnel {
    proxy: ForwardProxy,
    http: HttpConnector,
}

impl tower::Service<Uri> for ProxyTunnel {
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let mut tunnel = Tunnel::new(self.proxy.uri.clone(), self.http.clone());
        if let Some(auth) = self.proxy.authorization.clone() {
            tunnel = tunnel.with_auth(auth);
        }
        Box::pin(async move {
            let io = tower::ServiceExt::oneshot(tunnel, dst).await?;
            Ok(io)
        })
    }
}
