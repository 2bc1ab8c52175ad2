//! Outbound HTTP clients for integration calls.
//!
//! Two clients are kept: a trusted one for plugins served by this site and an
//! untrusted one for everything else. The untrusted client resolves names
//! through [`GuardedResolver`], so every address it connects to is checked
//! against reserved ranges unless the host or address is allowlisted. IP
//! literals never reach the resolver and are checked before sending.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use ipnet::IpNet;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{Client, RequestBuilder, redirect};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::egress::Egress;

/// Errors raised before a request leaves the process.
#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),

    /// The target resolves to a reserved address that is not allowlisted.
    #[error("address forbidden: {host} resolves to {ip}")]
    Forbidden { host: String, ip: IpAddr },

    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Hosts, addresses and networks the untrusted client may reach even though
/// they are reserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    hosts: Vec<String>,
    networks: Vec<IpNet>,
}

impl AllowList {
    /// Parse a whitespace or comma separated list of host names, IP
    /// addresses and CIDR ranges.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut list = Self::default();
        for entry in raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|entry| !entry.is_empty())
        {
            if let Ok(net) = entry.parse::<IpNet>() {
                list.networks.push(net);
            } else if let Ok(ip) = entry.parse::<IpAddr>() {
                list.networks.push(IpNet::from(ip));
            } else {
                list.hosts.push(entry.to_ascii_lowercase());
            }
        }
        list
    }

    /// Returns `true` if nothing is allowlisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.networks.is_empty()
    }

    fn allows_host(&self, host: &str) -> bool {
        self.hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host))
    }

    fn allows_ip(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// Reject the first reserved address in `addresses` that is not
    /// allowlisted.
    fn screen(
        &self,
        host: &str,
        addresses: impl IntoIterator<Item = IpAddr>,
    ) -> Result<(), OutboundError> {
        match addresses
            .into_iter()
            .find(|ip| is_reserved_ip(ip) && !self.allows_ip(*ip))
        {
            Some(ip) => {
                warn!(host = %host, %ip, "blocked outbound request to reserved address");
                Err(OutboundError::Forbidden {
                    host: host.to_string(),
                    ip,
                })
            }
            None => Ok(()),
        }
    }
}

/// Networks an untrusted integration may not reach.
static RESERVED_NETWORKS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.0.0.0/24",
        "192.0.2.0/24",
        "192.168.0.0/16",
        "198.18.0.0/15",
        "198.51.100.0/24",
        "203.0.113.0/24",
        "224.0.0.0/4",
        "240.0.0.0/4",
        // IPv4-compatible, including :: and ::1
        "::/96",
        "64:ff9b::/96",
        "64:ff9b:1::/48",
        "100::/64",
        "2001:db8::/32",
        "fc00::/7",
        "fe80::/10",
        "ff00::/8",
    ]
    .into_iter()
    .map(|cidr| cidr.parse().expect("Invalid CIDR"))
    .collect()
});

/// Returns `true` for private, loopback, link-local, multicast, documentation,
/// translation and otherwise non-routable addresses.
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 part.
#[must_use]
pub fn is_reserved_ip(ip: &IpAddr) -> bool {
    if let IpAddr::V6(v6) = ip {
        if let Some(mapped) = v6.to_ipv4_mapped() {
            return is_reserved_ip(&IpAddr::V4(mapped));
        }
    }
    RESERVED_NETWORKS.iter().any(|net| net.contains(ip))
}

/// DNS resolver for the untrusted client.
///
/// Screens the addresses reqwest is about to connect to, so a second DNS
/// answer cannot point an approved host at a reserved address.
#[derive(Debug, Clone)]
pub struct GuardedResolver {
    allow: Arc<AllowList>,
}

impl GuardedResolver {
    #[must_use]
    pub fn new(allow: AllowList) -> Self {
        Self {
            allow: Arc::new(allow),
        }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let allow = Arc::clone(&self.allow);
        Box::pin(async move {
            let host = name.as_str();
            let addresses: Vec<SocketAddr> = tokio::net::lookup_host((host, 0)).await?.collect();

            if !allow.allows_host(host) {
                allow.screen(host, addresses.iter().map(SocketAddr::ip))?;
            }

            let addrs: Addrs = Box::new(addresses.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Shared outbound HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpService {
    trusted: Client,
    untrusted: Client,
    allow: AllowList,
}

impl HttpService {
    /// Build both clients with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::Client` if a client cannot be constructed.
    pub fn new(timeout: Duration, allow: AllowList) -> Result<Self, OutboundError> {
        let trusted = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutboundError::Client(e.to_string()))?;
        let untrusted = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .dns_resolver(GuardedResolver::new(allow.clone()))
            .build()
            .map_err(|e| OutboundError::Client(e.to_string()))?;

        Ok(Self {
            trusted,
            untrusted,
            allow,
        })
    }

    /// Start a POST to `url` on the client matching `egress`.
    ///
    /// External targets are checked before the builder is returned and
    /// again by the resolver when the request connects.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::Forbidden` if an external target resolves to a
    /// reserved address that is not allowlisted.
    pub async fn post(&self, egress: Egress, url: &str) -> Result<RequestBuilder, OutboundError> {
        let parsed = Url::parse(url).map_err(|e| OutboundError::InvalidUrl(e.to_string()))?;

        match egress {
            Egress::Internal => Ok(self.trusted.post(parsed)),
            Egress::External => {
                self.check_address(&parsed).await?;
                Ok(self.untrusted.post(parsed))
            }
        }
    }

    async fn check_address(&self, url: &Url) -> Result<(), OutboundError> {
        let host = url
            .host_str()
            .ok_or_else(|| OutboundError::InvalidUrl(format!("{url} has no host")))?;
        let bare = host.trim_start_matches('[').trim_end_matches(']');

        if self.allow.allows_host(bare) {
            debug!(host = %bare, "host is allowlisted");
            return Ok(());
        }

        let addresses: Vec<IpAddr> = if let Ok(ip) = bare.parse::<IpAddr>() {
            vec![ip]
        } else {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((bare, port))
                .await
                .map_err(|e| OutboundError::Resolve {
                    host: bare.to_string(),
                    reason: e.to_string(),
                })?
                .map(|addr| addr.ip())
                .collect()
        };

        if addresses.is_empty() {
            return Err(OutboundError::Resolve {
                host: bare.to_string(),
                reason: "no addresses".to_string(),
            });
        }

        self.allow.screen(bare, addresses)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(allow: &str) -> HttpService {
        HttpService::new(Duration::from_secs(5), AllowList::parse(allow)).unwrap()
    }

    #[test]
    fn test_reserved_ranges() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "255.255.255.255",
            "100.64.0.1",
            "192.0.0.8",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
            "0.1.2.3",
            "192.0.2.10",
            "198.18.0.1",
            "198.51.100.7",
            "203.0.113.9",
            "224.0.0.1",
            "240.0.0.1",
            "64:ff9b::7f00:1",
            "::7f00:1",
            "ff02::1",
            "2001:db8::1",
        ] {
            assert!(is_reserved_ip(&ip.parse().unwrap()), "{ip} should be reserved");
        }

        for ip in [
            "8.8.8.8",
            "100.128.0.1",
            "198.20.0.1",
            "223.255.255.255",
            "2001:4860:4860::8888",
            "::ffff:8.8.8.8",
        ] {
            assert!(!is_reserved_ip(&ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[test]
    fn test_allow_list_parsing() {
        let list = AllowList::parse("localhost, 127.0.0.1\n10.0.0.0/8  Example.internal");
        assert!(list.allows_host("localhost"));
        assert!(list.allows_host("example.internal"));
        assert!(list.allows_ip("127.0.0.1".parse().unwrap()));
        assert!(list.allows_ip("10.20.30.40".parse().unwrap()));
        assert!(!list.allows_ip("127.0.0.2".parse().unwrap()));

        assert!(AllowList::parse("  ,, ").is_empty());
    }

    #[tokio::test]
    async fn test_external_loopback_is_forbidden() {
        let err = service("")
            .post(Egress::External, "http://127.0.0.1:9/hook")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("address forbidden"));

        let err = service("")
            .post(Egress::External, "http://[::1]:9/hook")
            .await
            .unwrap_err();
        assert!(matches!(err, OutboundError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_allowlisted_loopback_is_permitted() {
        assert!(
            service("localhost 127.0.0.1")
                .post(Egress::External, "http://127.0.0.1:9/hook")
                .await
                .is_ok()
        );
        assert!(
            service("127.0.0.0/8")
                .post(Egress::External, "http://127.0.0.5:9/hook")
                .await
                .is_ok()
        );
    }

    async fn resolve(allow: &str, host: &str) -> Result<Vec<SocketAddr>, String> {
        GuardedResolver::new(AllowList::parse(allow))
            .resolve(host.parse().unwrap())
            .await
            .map(|addrs| addrs.collect())
            .map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_resolver_rejects_reserved_answers() {
        let err = resolve("", "localhost").await.unwrap_err();
        assert!(err.contains("address forbidden"), "{err}");

        let addrs = resolve("localhost", "localhost").await.unwrap();
        assert!(addrs.iter().all(|addr| addr.ip().is_loopback()));

        let addrs = resolve("127.0.0.0/8 ::1", "localhost").await.unwrap();
        assert!(!addrs.is_empty());
    }

    #[tokio::test]
    async fn test_internal_skips_address_check() {
        assert!(
            service("")
                .post(Egress::Internal, "http://127.0.0.1:9/plugins/foo")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_url() {
        assert!(matches!(
            service("").post(Egress::External, "not a url").await,
            Err(OutboundError::InvalidUrl(_))
        ));
    }
}
