//! Outbound header rewriting and hop-by-hop stripping.
//!
//! [`rewrite_request_headers`] prepares client headers for the upstream
//! call: hop-by-hop headers go, client-supplied forwarding headers go,
//! `Host` is pointed at the backend, and the connection is marked
//! non-reusable. [`strip_response_hop_by_hop`] cleans upstream responses.

use std::sync::LazyLock;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "proxy-connection",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Forwarding headers a client may have set itself; never passed through.
static UNTRUSTED_FORWARDING: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| name.parse::<HeaderName>().ok())
        .collect()
});

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in Connection are hop-by-hop as well
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Strip hop-by-hop headers from an upstream response. The body is
/// streamed through untouched, so `content-length` stays valid.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
}

/// True when `TE` lists the `trailers` token, which gRPC relies on.
fn accepts_trailers(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("trailers"))
}

pub fn rewrite_request_headers(headers: &mut HeaderMap, host: &str) {
    let trailers = accepts_trailers(headers);
    strip_hop_by_hop(headers);
    if trailers {
        headers.insert(header::TE, HeaderValue::from_static("trailers"));
    }

    for name in UNTRUSTED_FORWARDING.iter() {
        headers.remove(name);
    }

    if let Ok(val) = HeaderValue::from_str(host) {
        headers.insert(header::HOST, val);
    }

    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
}
