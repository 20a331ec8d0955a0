//! Request extractors.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, header::COOKIE, request::Parts};

use crate::api::server::AppState;
use crate::auth::SESSION_COOKIE;
use crate::{Error, Result};

/// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
///
/// Entries are addresses or CIDR blocks (`10.0.0.0/8`, `fd00::/8`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Vec<(IpAddr, u8)>);

impl TrustedProxies {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let mut nets = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            let (addr, prefix) = match entry.split_once('/') {
                Some((addr, prefix)) => (addr, Some(prefix)),
                None => (entry, None),
            };
            let addr: IpAddr = addr
                .parse()
                .map_err(|_| Error::config(format!("invalid trusted proxy '{entry}'")))?;
            let max = if addr.is_ipv4() { 32 } else { 128 };
            let prefix = match prefix {
                Some(p) => p
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= max)
                    .ok_or_else(|| Error::config(format!("invalid trusted proxy '{entry}'")))?,
                None => max,
            };
            nets.push((addr.to_canonical(), prefix));
        }
        Ok(Self(nets))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.0.iter().any(|(net, prefix)| match (net, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                prefix_matches(u32::from(*net).into(), u32::from(ip).into(), *prefix, 32)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                prefix_matches(u128::from(*net), u128::from(ip), *prefix, 128)
            }
            _ => false,
        })
    }
}

fn prefix_matches(net: u128, ip: u128, prefix: u8, bits: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    let shift = u32::from(bits - prefix);
    (net >> shift) == (ip >> shift)
}

/// Network identity of the caller, used to key login attempts.
///
/// The socket peer, unless the peer is a trusted proxy: then the nearest
/// untrusted `X-Forwarded-For` hop, else `X-Real-IP`. `"unknown"` when
/// there is no peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn from_parts(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trusted: &TrustedProxies,
    ) -> Self {
        let Some(peer) = peer.map(|addr| addr.ip().to_canonical()) else {
            return Self("unknown".to_string());
        };
        if !trusted.contains(peer) {
            return Self(peer.to_string());
        }

        let header = |name: &str| {
            headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        };

        // Walk the chain right to left; every hop we trust vouches for the
        // one before it.
        let forwarded = header("x-forwarded-for");
        let from_chain = forwarded
            .iter()
            .rev()
            .find(|hop| {
                hop.parse::<IpAddr>()
                    .map_or(true, |ip| !trusted.contains(ip))
            })
            .or_else(|| forwarded.first())
            .cloned();

        let identity = from_chain
            .or_else(|| header("x-real-ip").into_iter().next())
            .unwrap_or_else(|| peer.to_string());
        Self(identity)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_parts(&parts.headers, peer, &state.trusted_proxies))
    }
}

/// Value of the session cookie, if the request carries one.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(raw: &str) -> Option<SocketAddr> {
        Some(raw.parse().unwrap())
    }

    #[test]
    fn test_identity_ignores_headers_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        let none = TrustedProxies::default();

        assert_eq!(
            ClientIdentity::from_parts(&headers, peer("203.0.113.7:5555"), &none).as_str(),
            "203.0.113.7"
        );
        assert_eq!(ClientIdentity::from_parts(&headers, None, &none).as_str(), "unknown");

        let other = TrustedProxies::parse(&["10.0.0.0/8"]).unwrap();
        assert_eq!(
            ClientIdentity::from_parts(&headers, peer("203.0.113.7:5555"), &other).as_str(),
            "203.0.113.7"
        );
    }

    #[test]
    fn test_identity_behind_trusted_proxy() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8", "192.168.1.5"]).unwrap();
        let proxy = peer("10.1.2.3:5555");

        let mut headers = HeaderMap::new();
        assert_eq!(
            ClientIdentity::from_parts(&headers, proxy, &trusted).as_str(),
            "10.1.2.3"
        );

        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(
            ClientIdentity::from_parts(&headers, proxy, &trusted).as_str(),
            "9.9.9.9"
        );

        // Client-supplied entries to the left of the real client are skipped.
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("6.6.6.6, 1.1.1.1, 192.168.1.5"),
        );
        assert_eq!(
            ClientIdentity::from_parts(&headers, proxy, &trusted).as_str(),
            "1.1.1.1"
        );

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(
            ClientIdentity::from_parts(&headers, proxy, &trusted).as_str(),
            "10.0.0.9"
        );

        // IPv4-mapped peers match IPv4 entries.
        let mapped = peer("[::ffff:10.1.2.3]:5555");
        assert_eq!(
            ClientIdentity::from_parts(&headers, mapped, &trusted).as_str(),
            "10.0.0.9"
        );
    }

    #[test]
    fn test_trusted_proxies_parse() {
        let trusted = TrustedProxies::parse(&["127.0.0.1", "fd00::/8", "0.0.0.0/0"]).unwrap();
        assert!(trusted.contains("127.0.0.1".parse().unwrap()));
        assert!(trusted.contains("fd12::1".parse().unwrap()));
        assert!(trusted.contains("8.8.8.8".parse().unwrap()));
        assert!(!trusted.contains("fe80::1".parse().unwrap()));

        assert!(TrustedProxies::parse(&Vec::<String>::new()).unwrap().is_empty());
        for bad in ["proxy.local", "10.0.0.0/33", "fd00::/x"] {
            assert!(TrustedProxies::parse(&[bad]).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_session_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=abc123"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(COOKIE, HeaderValue::from_static("sessionx=1; session="));
        assert_eq!(session_token(&headers), None);
    }
}
