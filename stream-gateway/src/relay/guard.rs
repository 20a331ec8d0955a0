//! Relay target vetting.
//!
//! Relay targets come straight from query strings, so every hop is checked:
//! the initial URL, each redirect and each DNS answer. Loopback, private,
//! link-local and unique-local addresses are refused unless
//! `allow_private_targets` is set.

use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::{Host, Url};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Only http/https URLs are allowed")]
    Scheme,

    #[error("URL has no host")]
    MissingHost,

    #[error("{0} is not an allowed relay target")]
    Blocked(String),

    #[error("Too many redirects")]
    TooManyRedirects,
}

/// Addresses that never leave the host or its local networks.
pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10 carrier-grade NAT
                || (a == 100 && (b & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
        }
    }
}

fn is_localhost_name(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost" || domain.ends_with(".localhost")
}

/// Check scheme and host of a relay target.
///
/// Host names other than `localhost` are checked again when they resolve.
pub fn check_target(target: &Url, allow_private: bool) -> Result<(), TargetError> {
    if !matches!(target.scheme(), "http" | "https") {
        return Err(TargetError::Scheme);
    }

    match target.host() {
        None => Err(TargetError::MissingHost),
        Some(Host::Domain(domain)) if is_localhost_name(domain) => {
            Err(TargetError::Blocked(domain.to_string()))
        }
        Some(Host::Domain(_)) => Ok(()),
        Some(Host::Ipv4(ip)) if !allow_private && is_internal_ip(IpAddr::V4(ip)) => {
            Err(TargetError::Blocked(ip.to_string()))
        }
        Some(Host::Ipv6(ip)) if !allow_private && is_internal_ip(IpAddr::V6(ip)) => {
            Err(TargetError::Blocked(ip.to_string()))
        }
        Some(_) => Ok(()),
    }
}

/// Follow redirects only to targets that pass [`check_target`].
pub fn redirect_policy(allow_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(TargetError::TooManyRedirects);
        }
        match check_target(attempt.url(), allow_private) {
            Ok(()) => attempt.follow(),
            Err(e) => {
                tracing::warn!(url = %attempt.url(), error = %e, "Relay redirect refused");
                attempt.error(e)
            }
        }
    })
}

/// Resolve `host`, keeping only public addresses.
pub async fn resolve_public(host: &str) -> Result<Vec<SocketAddr>, BoxError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await?
        .filter(|addr| !is_internal_ip(addr.ip()))
        .collect();

    if addrs.is_empty() {
        return Err(Box::new(TargetError::Blocked(host.to_string())));
    }
    Ok(addrs)
}

/// DNS resolver for the relay client that drops internal answers.
#[derive(Debug, Default)]
pub struct PublicDnsResolver;

impl Resolve for PublicDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addrs = resolve_public(name.as_str()).await?;
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
