//! Relay subsystem.
//!
//! The rewriter turns header-dependent provider URLs into URLs on this
//! gateway; the fetch side lives in `api::routes::relay`, vetted by
//! [`guard`].

pub mod guard;
pub mod rewriter;

use axum::http::{HeaderMap, header::HOST};
use serde::{Deserialize, Serialize};

pub use rewriter::{RELAY_PATH, relay_url, rewrite};

/// Relay mode configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Whether stream responses are routed through the relay.
    pub enabled: bool,
    /// Also rewrite streams that carry no headers.
    pub relay_headerless: bool,
    /// Externally visible base URL. When unset it is derived per request.
    pub public_url: Option<String>,
    /// Let the relay fetch loopback and private-network targets.
    pub allow_private_targets: bool,
}

/// Externally visible origin (`scheme://host`) of the inbound request.
pub fn origin_base(headers: &HeaderMap, config: &RelayConfig) -> String {
    if let Some(public_url) = config.public_url.as_deref().filter(|u| !u.is_empty()) {
        return public_url.trim_end_matches('/').to_string();
    }

    let first_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let scheme = first_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = first_value("x-forwarded-host")
        .or_else(|| first_value(HOST.as_str()))
        .unwrap_or_else(|| "localhost".to_string());

    format!("{scheme}://{host}")
}
