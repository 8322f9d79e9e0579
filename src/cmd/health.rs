//! `passway health`: check the health of a running instance.
//!
//! Sends `GET /-/healthz` to the given URL; any status other than 200
//! is an error, so the command doubles as a container health check.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::GatewayError;
use crate::health::HEALTHZ_PATH;

pub async fn execute(args: HealthArgs) -> Result<(), GatewayError> {
    let url = format!("{}{HEALTHZ_PATH}", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse()
            .map_err(|e: hyper::http::uri::InvalidUri| GatewayError::UriParse {
                source: Box::new(e),
            })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| GatewayError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if status != hyper::StatusCode::OK {
        return Err(GatewayError::HealthCheckFailed(status));
    }

    println!(
        "\u{2713} passway is healthy ({}): {}",
        args.url,
        String::from_utf8_lossy(&body).trim()
    );
    Ok(())
}
