//! Gateway configuration.
//!
//! Loaded from an optional JSON file, then overridden from the environment.
//!
//! ```json
//! {
//!   "server": { "bind_address": "0.0.0.0", "port": 8080, "trusted_proxies": ["127.0.0.1"] },
//!   "providers": [
//!     { "name": "torrentio", "base_url": "https://torrentio.example" }
//!   ],
//!   "default_providers": ["torrentio"],
//!   "filters": { "min_quality": { "aggregate": "720p" } },
//!   "relay": { "enabled": true },
//!   "auth": { "users": [{ "username": "admin", "password": "change-me" }] },
//!   "tmdb": { "api_key": "..." }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stream_providers::provider::{
    AddonProvider, DEFAULT_PROVIDER_TIMEOUT, ProviderRegistry, create_client_builder,
};
use tracing::info;

use crate::aggregator::FilterConfig;
use crate::api::extract::TrustedProxies;
use crate::api::server::ApiServerConfig;
use crate::auth::{AuthConfig, UserConfig};
use crate::relay::RelayConfig;
use crate::resolver::TmdbConfig;
use crate::{Error, Result};

/// Config file used when `GATEWAY_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.json";

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("defaults"),
        }
    }
}

/// One configured addon provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ApiServerConfig,
    pub providers: Vec<ProviderConfig>,
    /// Providers used when a request does not name one. Empty means all.
    pub default_providers: Vec<String>,
    /// HTTP deadline for a single provider call.
    pub provider_timeout_secs: u64,
    pub filters: FilterConfig,
    pub relay: RelayConfig,
    pub auth: AuthConfig,
    pub tmdb: TmdbConfig,
    pub log_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ApiServerConfig::default(),
            providers: Vec::new(),
            default_providers: Vec::new(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT.as_secs(),
            filters: FilterConfig::default(),
            relay: RelayConfig::default(),
            auth: AuthConfig::default(),
            tmdb: TmdbConfig::default(),
            log_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Load from `GATEWAY_CONFIG` (or `gateway.json` when present), apply
    /// environment overrides and validate.
    ///
    /// Runs before logging is up; the caller reports the source.
    pub fn load() -> Result<(Self, ConfigSource)> {
        let explicit = std::env::var("GATEWAY_CONFIG").ok().filter(|p| !p.is_empty());
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_FILE));

        let (mut config, source) = if path.exists() {
            (Self::from_file(&path)?, ConfigSource::File(path))
        } else if explicit.is_some() {
            return Err(Error::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        } else {
            (Self::default(), ConfigSource::Defaults)
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, source))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(bind_address) = var("API_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = var("API_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(public_url) = var("PUBLIC_URL") {
            self.relay.public_url = Some(public_url);
        }
        if let Some(enabled) = var("RELAY_ENABLED").and_then(|v| parse_bool(&v)) {
            self.relay.enabled = enabled;
        }
        if let Some(allow) = var("RELAY_ALLOW_PRIVATE").and_then(|v| parse_bool(&v)) {
            self.relay.allow_private_targets = allow;
        }
        if let Some(list) = var("TRUSTED_PROXIES") {
            self.server.trusted_proxies = split_list(&list);
        }
        if let Some(api_key) = var("TMDB_API_KEY") {
            self.tmdb.api_key = Some(api_key);
        }
        if let Some(required) = var("REQUIRE_SESSION").and_then(|v| parse_bool(&v)) {
            self.auth.require_session = required;
        }
        if let Some(list) = var("DEFAULT_PROVIDERS") {
            self.default_providers = split_list(&list);
        }
        if let Some(secs) = var("PROVIDER_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.provider_timeout_secs = secs;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }

        if let (Some(username), Some(password)) = (var("AUTH_USERNAME"), lookup("AUTH_PASSWORD")) {
            self.auth.users.retain(|u| u.username != username);
            self.auth.users.push(UserConfig {
                username,
                password: Some(password),
                password_hash: None,
            });
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(Error::config(format!("providers[{i}] has an empty name")));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(Error::config(format!(
                    "provider '{}' is configured twice",
                    provider.name
                )));
            }
            let parsed = url::Url::parse(&provider.base_url).map_err(|e| {
                Error::config(format!("provider '{}' base_url: {}", provider.name, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "provider '{}' base_url must be http or https",
                    provider.name
                )));
            }
        }

        if let Some(unknown) = self
            .default_providers
            .iter()
            .find(|name| !self.providers.iter().any(|p| &p.name == *name))
        {
            return Err(Error::config(format!(
                "default provider '{unknown}' is not configured"
            )));
        }

        if self.provider_timeout_secs == 0 {
            return Err(Error::config("provider_timeout_secs must be positive"));
        }

        TrustedProxies::parse(&self.server.trusted_proxies)?;

        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Build the provider registry in configuration order.
    pub fn build_registry(&self) -> Result<ProviderRegistry> {
        let client = create_client_builder(Some(self.provider_timeout())).build()?;

        let mut registry = ProviderRegistry::new();
        for provider in &self.providers {
            let addon = AddonProvider::new(&provider.name, &provider.base_url, client.clone())
                .with_enabled(provider.enabled);
            registry.register(Arc::new(addon))?;
            info!(
                provider = %provider.name,
                enabled = provider.enabled,
                "Registered provider"
            );
        }
        Ok(registry)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn provider(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            base_url: format!("https://{name}.example"),
            enabled: true,
        }
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.provider_timeout_secs, 15);
        assert!(!config.relay.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{ "port": 9000 }},
                "providers": [
                    {{ "name": "a", "base_url": "https://a.example" }},
                    {{ "name": "b", "base_url": "https://b.example", "enabled": false }}
                ],
                "filters": {{ "exclude_codecs": {{ "aggregate": ["hevc"] }} }},
                "relay": {{ "enabled": true, "relay_headerless": true }}
            }}"#
        )
        .unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.providers.len(), 2);
        assert!(config.providers[0].enabled);
        assert!(!config.providers[1].enabled);
        assert_eq!(config.filters.exclude_codecs["aggregate"], vec!["hevc"]);
        assert!(config.relay.relay_headerless);
        assert!(config.validate().is_ok());

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(!registry.get("b").unwrap().is_enabled());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides(env(&[
            ("API_PORT", "9999"),
            ("API_BIND_ADDRESS", "127.0.0.1"),
            ("PUBLIC_URL", "https://gw.example"),
            ("RELAY_ENABLED", "true"),
            ("TMDB_API_KEY", "k"),
            ("DEFAULT_PROVIDERS", "a, b,,"),
            ("PROVIDER_TIMEOUT_SECS", "5"),
            ("REQUIRE_SESSION", "yes"),
            ("AUTH_USERNAME", "admin"),
            ("AUTH_PASSWORD", "pw"),
            ("TRUSTED_PROXIES", "10.0.0.1, 172.16.0.0/12"),
            ("RELAY_ALLOW_PRIVATE", "off"),
        ]));

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.relay.public_url.as_deref(), Some("https://gw.example"));
        assert!(config.relay.enabled);
        assert_eq!(config.tmdb.api_key.as_deref(), Some("k"));
        assert_eq!(config.default_providers, vec!["a", "b"]);
        assert_eq!(config.provider_timeout(), Duration::from_secs(5));
        assert!(config.auth.require_session);
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.auth.users[0].password.as_deref(), Some("pw"));
        assert_eq!(config.server.trusted_proxies, vec!["10.0.0.1", "172.16.0.0/12"]);
        assert!(!config.relay.allow_private_targets);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides(env(&[("API_PORT", "not-a-port"), ("RELAY_ENABLED", "maybe")]));
        assert_eq!(config.server.port, ApiServerConfig::default().port);
        assert!(!config.relay.enabled);
    }

    #[test]
    fn test_config_source_display() {
        let source = ConfigSource::File(PathBuf::from("/etc/gateway.json"));
        assert_eq!(source.to_string(), "/etc/gateway.json");
        assert_eq!(ConfigSource::Defaults.to_string(), "defaults");
    }

    #[test]
    fn test_invalid_trusted_proxy_fails_validation() {
        let mut config = GatewayConfig::default();
        config.server.trusted_proxies = vec!["gateway.lan".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = GatewayConfig {
            providers: vec![provider("a"), provider("a")],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.providers = vec![ProviderConfig {
            base_url: "ftp://a.example".to_string(),
            ..provider("a")
        }];
        assert!(config.validate().is_err());

        config.providers = vec![provider("a")];
        config.default_providers = vec!["missing".to_string()];
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.default_providers = vec!["a".to_string()];
        assert!(config.validate().is_ok());
    }
}
