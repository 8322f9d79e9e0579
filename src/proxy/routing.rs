//! Service-key extraction and outbound URI construction.
//!
//! [`resolve`] takes the inbound path and query, picks the first path
//! segment as the service key, looks it up in [`ServiceRoutes`], and
//! builds the absolute upstream URI as plain text: base URL (trailing
//! slash removed), then the remainder of the path, then the raw query.
//! Nothing is re-encoded or normalized on the way, so the base URL stays
//! a literal prefix of every outbound path.

use axum::http::Uri;

use crate::config::routes::ServiceRoutes;
use crate::error::RequestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub service_key: String,
    pub base_url: String,
    /// Inbound path minus the leading service-key segment.
    pub forwarded_path: String,
    pub target: Uri,
    /// Authority of the base URL without userinfo, explicit port kept.
    pub host: String,
}

/// First non-empty path segment.
#[must_use]
pub fn service_key(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

/// Path with the leading `/{service_key}` removed, e.g. `/alpha/v1/x`
/// becomes `/v1/x` and `/alpha` becomes the empty string.
#[must_use]
pub fn forwarded_path<'a>(path: &'a str, service_key: &str) -> &'a str {
    let trimmed = path.trim_start_matches('/');
    trimmed.strip_prefix(service_key).unwrap_or(trimmed)
}

/// `.` or `..` segments, literal or percent-encoded. Upstream servers
/// resolve these, which would climb out of the base URL's path.
#[must_use]
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

pub fn resolve(
    routes: &ServiceRoutes,
    path: &str,
    query: Option<&str>,
) -> Result<ResolvedRoute, RequestError> {
    let key = service_key(path).ok_or(RequestError::NoServiceKey)?;
    let base_url = routes
        .resolve(key)
        .ok_or_else(|| RequestError::UnknownService(key.to_string()))?;

    let forwarded = forwarded_path(path, key);
    if has_dot_segment(forwarded) {
        return Err(RequestError::DotSegment(path.to_string()));
    }

    let invalid = |url: &str, reason: String| RequestError::InvalidUpstreamUrl {
        url: url.to_string(),
        reason,
    };

    // Validation only; the parsed form is normalized and never sent
    let base = url::Url::parse(base_url).map_err(|e| invalid(base_url, e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(
            base_url,
            format!("unsupported scheme '{}'", base.scheme()),
        ));
    }

    let mut raw = base_url.trim_end_matches('/').to_string();
    raw.push_str(forwarded);
    if forwarded.is_empty() && base.path() == "/" {
        raw.push('/');
    }
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        raw.push('?');
        raw.push_str(q);
    }

    let target: Uri = raw
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| invalid(&raw, e.to_string()))?;
    let host = target
        .authority()
        .and_then(|authority| authority.as_str().rsplit('@').next())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid(&raw, "base URL has no host".into()))?
        .to_string();

    Ok(ResolvedRoute {
        service_key: key.to_string(),
        base_url: base_url.to_string(),
        forwarded_path: forwarded.to_string(),
        target,
        host,
    })
}
