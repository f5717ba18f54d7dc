//! SSRF hardening for admin-submitted ERP URLs: reject anything that
//! doesn't resolve to a public, routable address before the transport ever
//! dials it. Hostnames are resolved with a 5-second DNS timeout and the
//! resolution is cached (keyed by hostname) so the hot path of "reuse an
//! already-validated credential" doesn't redo a DNS round trip on every RPC
//! call.

use crate::errors::SyncError;
use quick_cache_ttl::CacheWithTTL;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);
const DNS_CACHE_TTL: Duration = Duration::from_secs(300);
const DNS_CACHE_CAPACITY: usize = 512;

pub struct SsrfGuard {
    dns_cache: CacheWithTTL<String, Vec<IpAddr>>,
}

impl SsrfGuard {
    pub fn new() -> Self {
        Self {
            dns_cache: CacheWithTTL::new(DNS_CACHE_CAPACITY, DNS_CACHE_TTL),
        }
    }

    /// Validates `raw_url` for scheme, then resolves its host and checks
    /// every resolved address against the blocked ranges below. Returns the
    /// parsed `Url` on success so callers don't have to re-parse it.
    pub async fn validate(&self, raw_url: &str) -> Result<Url, SyncError> {
        let url = Url::parse(raw_url)
            .map_err(|e| SyncError::ValidationError(format!("invalid URL: {e}")))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(SyncError::ValidationError(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| SyncError::ValidationError("URL has no host".to_string()))?
            .to_string();

        // A literal IP in the URL bypasses DNS entirely, so check it directly
        // without touching the cache.
        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_blocked(&ip) {
                return Err(SyncError::ValidationError(format!(
                    "host resolves to a blocked address: {ip}"
                )));
            }
            return Ok(url);
        }

        let addrs = self.resolve(&host, url.port_or_known_default().unwrap_or(443)).await?;

        if addrs.is_empty() {
            return Err(SyncError::ValidationError(format!(
                "host did not resolve to any address: {host}"
            )));
        }

        if let Some(blocked) = addrs.iter().find(|ip| is_blocked(ip)) {
            return Err(SyncError::ValidationError(format!(
                "host resolves to a blocked address: {blocked}"
            )));
        }

        Ok(url)
    }

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, SyncError> {
        if let Some(cached) = self.dns_cache.get(&host.to_string()) {
            return Ok(cached);
        }

        let lookup = tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((host, port)))
            .await
            .map_err(|_| SyncError::TransportFailure(format!("DNS timeout resolving {host}")))?
            .map_err(|e| SyncError::TransportFailure(format!("DNS resolution failed for {host}: {e}")))?;

        let addrs: Vec<IpAddr> = lookup.map(|s: SocketAddr| s.ip()).collect();

        self.dns_cache.insert(host.to_string(), addrs.clone());

        Ok(addrs)
    }
}

impl Default for SsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Loopback, private, link-local, unspecified, multicast and
/// carrier-grade-NAT ranges — anything that should never be reachable as an
/// "external ERP" endpoint.
fn is_blocked(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_multicast()
                || v4.is_broadcast()
                || is_carrier_grade_nat(*v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || is_unique_local_v6(*v6)
                || is_unicast_link_local_v6(*v6)
        }
    }
}

fn is_carrier_grade_nat(v4: std::net::Ipv4Addr) -> bool {
    // 100.64.0.0/10, RFC 6598
    let octets = v4.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000
}

fn is_unique_local_v6(v6: std::net::Ipv6Addr) -> bool {
    // fc00::/7
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

fn is_unicast_link_local_v6(v6: std::net::Ipv6Addr) -> bool {
    // fe80::/10
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_loopback_literal() {
        let guard = SsrfGuard::new();
        let err = guard.validate("https://127.0.0.1/xmlrpc").await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_private_literal() {
        let guard = SsrfGuard::new();
        let err = guard.validate("https://10.0.0.5/jsonrpc").await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let guard = SsrfGuard::new();
        let err = guard.validate("ftp://example.com/").await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_link_local() {
        let guard = SsrfGuard::new();
        let err = guard.validate("http://169.254.169.254/latest/meta-data").await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }

    #[test]
    fn carrier_grade_nat_range_is_blocked() {
        let ip: IpAddr = "100.64.0.1".parse().unwrap();
        assert!(is_blocked(&ip));

        let ip: IpAddr = "100.63.255.255".parse().unwrap();
        assert!(!is_blocked(&ip));
    }
}
