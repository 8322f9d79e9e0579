//! Integration tests for upstream calls routed through a forward proxy.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, Uri};
use passway::config::routes::ServiceRoutes;
use passway::config::Settings;
use passway::middleware::auth::AuthToken;
use passway::middleware::client_origin::{InternalNetworks, DEFAULT_INTERNAL_NETWORKS};
use passway::proxy::transport::TransportSettings;
use passway::server::{self, AppState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn echo(uri: Uri, headers: HeaderMap) -> String {
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    format!("{uri} host={host}")
}

async fn start_backend() -> SocketAddr {
    let router = axum::Router::new().fallback(echo);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Minimal `CONNECT` proxy. Records every request head it receives.
async fn start_connect_proxy() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(tunnel(stream, log.clone()));
        }
    });

    (addr, seen)
}

async fn tunnel(mut client: TcpStream, seen: Arc<Mutex<Vec<String>>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = client.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        head.extend_from_slice(&buf[..n]);
    }
    let head = String::from_utf8_lossy(&head).to_string();
    seen.lock().unwrap().push(head.clone());

    let mut request_line = head.lines().next().unwrap_or_default().split(' ');
    if request_line.next() != Some("CONNECT") {
        let _ = client
            .write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n")
            .await;
        return;
    }
    let target = request_line.next().unwrap_or_default().to_string();

    let mut upstream = TcpStream::connect(target).await.unwrap();
    client
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await
        .unwrap();
    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}

async fn start_gateway(backend: SocketAddr, forward_proxy: String) -> SocketAddr {
    let settings = Settings {
        routes: ServiceRoutes::from_vars([("APP_REAL_HOST_ALPHA", format!("http://{backend}"))]),
        internal_networks: InternalNetworks::parse(DEFAULT_INTERNAL_NETWORKS).unwrap(),
        auth_token: AuthToken::new("s3cret"),
        transport: TransportSettings {
            forward_proxy: Some(forward_proxy),
            header_timeout: Some(Duration::from_secs(5)),
            idle_timeout: None,
        },
        service_name: "test".into(),
    };
    let router = server::build_router(Arc::new(AppState::new(settings)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn upstream_call_goes_through_connect_tunnel() {
    let backend = start_backend().await;
    let (proxy, seen) = start_connect_proxy().await;
    let addr = start_gateway(backend, format!("http://{proxy}")).await;

    let resp = client()
        .get(format!("http://{addr}/alpha/models?limit=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.text().await.unwrap(),
        format!("/models?limit=2 host={backend}")
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(
        seen[0].starts_with(&format!("CONNECT {backend} ")),
        "{}",
        seen[0]
    );
}

#[tokio::test]
async fn proxy_credentials_are_sent_as_basic_auth() {
    let backend = start_backend().await;
    let (proxy, seen) = start_connect_proxy().await;
    let addr = start_gateway(backend, format!("http://user:pass@{proxy}")).await;

    let resp = client()
        .get(format!("http://{addr}/alpha/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(
        seen[0]
            .to_ascii_lowercase()
            .contains("proxy-authorization: basic dxnlcjpwyxnz"),
        "{}",
        seen[0]
    );
}

#[tokio::test]
async fn unreachable_forward_proxy_is_bad_gateway() {
    let backend = start_backend().await;
    let vacant = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let vacant_addr = vacant.local_addr().unwrap();
    drop(vacant);
    let addr = start_gateway(backend, format!("http://{vacant_addr}")).await;

    let resp = client()
        .get(format!("http://{addr}/alpha/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}
