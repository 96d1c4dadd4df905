//! Resolution of the originating client address from proxy headers.
//!
//! Headers are parsed here rather than through `axum-client-ip`, which
//! resolves a single fixed source. The resolver needs an ordered fallback
//! chain, a right-to-left walk over hop lists that skips trusted proxies, and
//! a mode that honors headers from every peer when no networks are configured.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use axum::http::HeaderMap;
#[cfg(feature = "config")]
use clap::Args;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// A proxy header that may carry the client address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyHeader {
    /// `CF-Connecting-IP`, set by Cloudflare.
    CfConnectingIp,
    /// `True-Client-IP`, set by Akamai and Cloudflare Enterprise.
    TrueClientIp,
    /// `X-Real-IP`, commonly set by nginx.
    XRealIp,
    /// `X-Forwarded-For`, a comma separated hop list.
    XForwardedFor,
    /// `Forwarded` (RFC 7239).
    Forwarded,
}

impl ProxyHeader {
    /// Default resolution order.
    pub const DEFAULT_ORDER: [Self; 4] = [
        Self::CfConnectingIp,
        Self::XRealIp,
        Self::XForwardedFor,
        Self::Forwarded,
    ];

    /// Returns the lowercase header name.
    pub fn header_name(self) -> &'static str {
        match self {
            Self::CfConnectingIp => "cf-connecting-ip",
            Self::TrueClientIp => "true-client-ip",
            Self::XRealIp => "x-real-ip",
            Self::XForwardedFor => "x-forwarded-for",
            Self::Forwarded => "forwarded",
        }
    }

    /// Returns `true` for headers listing one entry per hop.
    fn is_hop_list(self) -> bool {
        matches!(self, Self::XForwardedFor | Self::Forwarded)
    }
}

/// Trusted proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ProxyConfig {
    /// Ordered list of proxy headers consulted for the client address.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "TRUSTED_PROXY_HEADERS",
            value_delimiter = ',',
            default_values = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for", "forwarded"]
        )
    )]
    pub trusted_headers: Vec<ProxyHeader>,

    /// Networks of proxies whose headers are honored.
    ///
    /// If empty, headers are honored from every peer.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "TRUSTED_PROXIES",
            value_delimiter = ',',
            value_parser = parse_trusted_proxy
        )
    )]
    pub trusted_proxies: Vec<IpNet>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            trusted_headers: ProxyHeader::DEFAULT_ORDER.to_vec(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Validates the header chain.
    pub fn validate(&self) -> Result<()> {
        if self.trusted_headers.is_empty() {
            return Err(Error::config("at least one trusted proxy header is required"));
        }

        Ok(())
    }
}

/// Parses a trusted proxy as a network (`10.0.0.0/8`) or a single address.
#[cfg(feature = "config")]
fn parse_trusted_proxy(value: &str) -> std::result::Result<IpNet, String> {
    let value = value.trim();
    value
        .parse::<IpNet>()
        .or_else(|_| value.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| format!("'{value}' is neither an IP address nor a network"))
}

/// Derives the client address from trusted proxy headers.
///
/// The result is a pure function of the request headers, the trust
/// configuration and the transport peer address.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    headers: Arc<[ProxyHeader]>,
    trusted_proxies: Arc<[IpNet]>,
}

impl ClientIpResolver {
    /// Creates a resolver from configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            headers: config.trusted_headers.iter().copied().collect(),
            trusted_proxies: config.trusted_proxies.iter().copied().collect(),
        }
    }

    /// Resolves the client address.
    ///
    /// The first configured header yielding a well-formed address wins. Falls
    /// back to the peer address, then to `0.0.0.0` when no peer is known.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
        let fallback = peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        if !self.trusts_peer(peer) {
            return fallback;
        }

        self.headers
            .iter()
            .find_map(|header| self.from_header(*header, headers))
            .unwrap_or(fallback)
    }

    fn trusts_peer(&self, peer: Option<IpAddr>) -> bool {
        self.trusted_proxies.is_empty() || peer.is_some_and(|ip| self.is_trusted(ip))
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(&ip))
    }

    fn from_header(&self, header: ProxyHeader, headers: &HeaderMap) -> Option<IpAddr> {
        let mut values = headers
            .get_all(header.header_name())
            .iter()
            .filter_map(|value| value.to_str().ok());

        if !header.is_hop_list() {
            return values.next().and_then(parse_node);
        }

        let hops: Vec<Option<IpAddr>> = values
            .flat_map(|value| value.split(','))
            .map(|entry| match header {
                ProxyHeader::Forwarded => forwarded_for(entry),
                _ => parse_node(entry),
            })
            .collect();

        self.select_hop(&hops)
    }

    /// Picks the client entry from a hop list ordered client first.
    fn select_hop(&self, hops: &[Option<IpAddr>]) -> Option<IpAddr> {
        if !self.trusted_proxies.is_empty() {
            for hop in hops.iter().rev() {
                match hop {
                    Some(ip) if self.is_trusted(*ip) => continue,
                    Some(ip) => return Some(*ip),
                    None => return None,
                }
            }
        }

        hops.iter().flatten().copied().next()
    }
}

/// Extracts the `for=` node of a single `Forwarded` element.
fn forwarded_for(element: &str) -> Option<IpAddr> {
    element
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("for"))
        .and_then(|(_, node)| parse_node(node))
}

/// Parses a node (`203.0.113.7`, `203.0.113.7:8080`, `"[2001:db8::1]:443"`).
fn parse_node(node: &str) -> Option<IpAddr> {
    let node = node.trim().trim_matches('"');

    if let Some(rest) = node.strip_prefix('[') {
        let (address, _) = rest.split_once(']')?;
        return address.parse::<Ipv6Addr>().ok().map(IpAddr::V6);
    }

    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }

    let (host, port) = node.rsplit_once(':')?;
    port.parse::<u16>().ok()?;
    host.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    fn resolver(trusted_proxies: &[&str]) -> ClientIpResolver {
        ClientIpResolver::new(&ProxyConfig {
            trusted_proxies: trusted_proxies
                .iter()
                .map(|net| net.parse().expect("valid network"))
                .collect(),
            ..ProxyConfig::default()
        })
    }

    fn ip(value: &str) -> IpAddr {
        value.parse().expect("valid address")
    }

    #[test]
    fn falls_back_to_peer_without_headers() {
        let resolver = resolver(&[]);
        assert_eq!(
            resolver.resolve(&HeaderMap::new(), Some(ip("192.0.2.1"))),
            ip("192.0.2.1")
        );
        assert_eq!(
            resolver.resolve(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn first_configured_header_wins() {
        let headers = headers(&[
            ("x-forwarded-for", "198.51.100.9"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);

        assert_eq!(
            resolver(&[]).resolve(&headers, Some(ip("10.0.0.1"))),
            ip("203.0.113.7")
        );
    }

    #[test]
    fn malformed_header_is_skipped() {
        let headers = headers(&[
            ("cf-connecting-ip", "not-an-ip"),
            ("x-real-ip", "203.0.113.7"),
        ]);

        assert_eq!(resolver(&[]).resolve(&headers, None), ip("203.0.113.7"));
    }

    #[test]
    fn forwarded_for_takes_leftmost_well_formed_entry() {
        let headers = headers(&[("x-forwarded-for", "garbage, 203.0.113.7, 10.0.0.2")]);
        assert_eq!(resolver(&[]).resolve(&headers, None), ip("203.0.113.7"));
    }

    #[test]
    fn forwarded_for_spanning_multiple_lines() {
        let headers = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-forwarded-for", "10.0.0.2"),
        ]);
        assert_eq!(resolver(&[]).resolve(&headers, None), ip("203.0.113.7"));
    }

    #[test]
    fn rfc7239_forwarded_header() {
        let ipv6 = headers(&[(
            "forwarded",
            "for=\"[2001:db8:cafe::17]:4711\";proto=https, for=10.0.0.2",
        )]);
        assert_eq!(resolver(&[]).resolve(&ipv6, None), ip("2001:db8:cafe::17"));

        let with_port = headers(&[("forwarded", "proto=http;For=192.0.2.60:8080;by=203.0.113.43")]);
        assert_eq!(resolver(&[]).resolve(&with_port, None), ip("192.0.2.60"));
    }

    #[test]
    fn untrusted_peer_headers_are_ignored() {
        let headers = headers(&[("x-real-ip", "203.0.113.7")]);
        let resolver = resolver(&["10.0.0.0/8"]);

        assert_eq!(
            resolver.resolve(&headers, Some(ip("198.51.100.1"))),
            ip("198.51.100.1")
        );
        assert_eq!(
            resolver.resolve(&headers, Some(ip("10.1.2.3"))),
            ip("203.0.113.7")
        );
    }

    #[test]
    fn trusted_hops_are_skipped_right_to_left() {
        let headers = headers(&[(
            "x-forwarded-for",
            "198.51.100.66, 203.0.113.7, 10.0.0.3, 10.0.0.2",
        )]);

        assert_eq!(
            resolver(&["10.0.0.0/8"]).resolve(&headers, Some(ip("10.0.0.1"))),
            ip("203.0.113.7")
        );
    }

    #[test]
    fn proxy_header_names_parse() -> anyhow::Result<()> {
        assert_eq!("x-forwarded-for".parse::<ProxyHeader>()?, ProxyHeader::XForwardedFor);
        assert_eq!("CF-Connecting-IP".parse::<ProxyHeader>()?, ProxyHeader::CfConnectingIp);
        assert_eq!(ProxyHeader::TrueClientIp.as_ref(), "true-client-ip");
        assert!("via".parse::<ProxyHeader>().is_err());
        Ok(())
    }

    #[test]
    fn empty_header_chain_is_rejected() {
        let config = ProxyConfig {
            trusted_headers: Vec::new(),
            ..ProxyConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
