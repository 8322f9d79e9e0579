//! Client origin classification.
//!
//! [`client_ip`] derives the caller's address from forwarding headers
//! (trusting the edge in front of the gateway) or the socket peer.
//! [`InternalNetworks`] decides whether that address belongs to one of
//! the configured internal CIDR ranges.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use ipnet::IpNet;

use crate::error::GatewayError;

pub const DEFAULT_INTERNAL_NETWORKS: &str = "127.0.0.0/8,10.0.0.0/8,172.16.0.0/12,192.168.0.0/16";

/// Ordered, immutable set of internal CIDR ranges.
#[derive(Debug, Clone, Default)]
pub struct InternalNetworks {
    networks: Vec<IpNet>,
}

impl InternalNetworks {
    /// Parse a comma-separated CIDR list. Blank entries are skipped; any
    /// malformed entry fails the whole list.
    pub fn parse(list: &str) -> Result<Self, GatewayError> {
        let mut networks = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let network: IpNet = entry.parse().map_err(|source| GatewayError::InvalidNetwork {
                entry: entry.to_string(),
                source,
            })?;
            // Normalise host bits away, e.g. 10.1.2.3/8 -> 10.0.0.0/8
            let network = network.trunc();
            tracing::info!(network = %network, "added internal network");
            networks.push(network);
        }
        Ok(Self { networks })
    }

    /// Membership test. Unparsable addresses and an empty set are both
    /// treated as external.
    #[must_use]
    pub fn is_internal(&self, client_ip: &str) -> bool {
        if self.networks.is_empty() {
            return false;
        }
        let Ok(ip) = client_ip.parse::<IpAddr>() else {
            return false;
        };
        self.networks.iter().any(|network| network.contains(&ip))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        return xff.split(',').next().unwrap_or(xff).trim().to_string();
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.to_string();
    }

    remote.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
