//! Integration tests for the access log line emitted per proxied request.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use passway::config::routes::ServiceRoutes;
use passway::config::Settings;
use passway::middleware::auth::AuthToken;
use passway::middleware::client_origin::{InternalNetworks, DEFAULT_INTERNAL_NETWORKS};
use passway::proxy::transport::TransportSettings;
use passway::server::{build_router, AppState};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink for formatted log output.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Capture {
    /// Field part of every access line, span context stripped.
    fn access_lines(&self) -> Vec<String> {
        let raw = self.0.lock().unwrap();
        String::from_utf8_lossy(&raw)
            .lines()
            .filter_map(|line| line.split_once("request completed"))
            .map(|(_, fields)| fields.trim().to_string())
            .collect()
    }

    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

const FIELD_ORDER: [&str; 7] = [
    "remote_addr=",
    "method=",
    "uri=",
    "request_size=",
    "duration=",
    "status=",
    "response_size=",
];

fn assert_field_order(line: &str) {
    let positions: Vec<usize> = FIELD_ORDER
        .iter()
        .map(|key| {
            line.find(key)
                .unwrap_or_else(|| panic!("{key} missing from {line}"))
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{line}");
}

async fn start_backend() -> SocketAddr {
    let router = axum::Router::new().fallback(|| async { "hello world" });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn app(base_url: String) -> axum::Router {
    let settings = Settings {
        routes: ServiceRoutes::from_vars([("APP_REAL_HOST_ALPHA", base_url)]),
        internal_networks: InternalNetworks::parse(DEFAULT_INTERNAL_NETWORKS).unwrap(),
        auth_token: AuthToken::new("s3cret"),
        transport: TransportSettings {
            header_timeout: Some(Duration::from_secs(5)),
            ..TransportSettings::default()
        },
        service_name: "test".into(),
    };
    build_router(Arc::new(AppState::new(settings)))
}

fn internal(method: &str, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "10.1.2.3")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn proxied_request_logs_one_line() {
    let backend = start_backend().await;
    let capture = Capture::default();
    let _guard = capture.install();

    let resp = app(format!("http://{backend}"))
        .oneshot(internal("POST", "/alpha/hello?x=1", "abc"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // Nothing is logged until the body has been sent
    assert!(capture.access_lines().is_empty());

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello world");

    let lines = capture.access_lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    let line = &lines[0];
    assert_field_order(line);
    assert!(line.contains("remote_addr=-"), "{line}");
    assert!(line.contains("method=POST"), "{line}");
    assert!(line.contains("uri=/alpha/hello?x=1"), "{line}");
    assert!(line.contains("request_size=3.00B"), "{line}");
    assert!(line.contains("status=200"), "{line}");
    assert!(line.contains("response_size=11.00B"), "{line}");
}

#[tokio::test]
async fn rejected_request_is_not_access_logged() {
    let capture = Capture::default();
    let _guard = capture.install();

    // No forwarding headers and no peer address: external, no token
    let resp = app("http://127.0.0.1:9".into())
        .oneshot(
            Request::builder()
                .uri("/alpha/hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    resp.into_body().collect().await.unwrap();

    assert!(capture.access_lines().is_empty());
}

#[tokio::test]
async fn unknown_service_is_logged_with_status() {
    let capture = Capture::default();
    let _guard = capture.install();

    let resp = app("http://127.0.0.1:9".into())
        .oneshot(internal("GET", "/gamma/v1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    resp.into_body().collect().await.unwrap();

    let lines = capture.access_lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert_field_order(&lines[0]);
    assert!(lines[0].contains("status=501"), "{}", lines[0]);
    assert!(lines[0].contains("request_size=0.00B"), "{}", lines[0]);
    assert!(lines[0].contains("response_size=0.00B"), "{}", lines[0]);
}

#[tokio::test]
async fn unreachable_upstream_is_logged_as_bad_gateway() {
    let vacant = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let vacant_addr = vacant.local_addr().unwrap();
    drop(vacant);

    let capture = Capture::default();
    let _guard = capture.install();

    let resp = app(format!("http://{vacant_addr}"))
        .oneshot(internal("GET", "/alpha/v1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    resp.into_body().collect().await.unwrap();

    let lines = capture.access_lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("status=502"), "{}", lines[0]);
    assert!(lines[0].contains("response_size=0.00B"), "{}", lines[0]);
}
