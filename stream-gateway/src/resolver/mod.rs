//! Catalog identifier resolution (TMDB → IMDB).

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use stream_providers::provider::MediaType;
use tracing::{debug, warn};

use crate::{Error, Result};

/// TMDB API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

/// Resolves a catalog id into the IMDB id providers are keyed by.
#[async_trait]
pub trait IdResolver: Send + Sync {
    /// `Ok(None)` means the id is unknown upstream, not a failure.
    async fn resolve_imdb_id(&self, media_type: MediaType, tmdb_id: &str) -> Result<Option<String>>;
}

/// Ids that already are IMDB ids pass through untouched.
pub fn as_imdb_id(id: &str) -> Option<&str> {
    let digits = id.strip_prefix("tt")?;
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

/// Resolver backed by the TMDB `external_ids` endpoint, with an in-memory cache.
pub struct TmdbResolver {
    client: Client,
    config: TmdbConfig,
    cache: DashMap<(MediaType, String), String>,
}

impl TmdbResolver {
    pub fn new(client: Client, config: TmdbConfig) -> Self {
        Self {
            client,
            config,
            cache: DashMap::new(),
        }
    }

    fn endpoint(&self, media_type: MediaType, tmdb_id: &str) -> String {
        let kind = match media_type {
            MediaType::Movie => "movie",
            MediaType::Series => "tv",
        };
        format!(
            "{}/{}/{}/external_ids",
            self.config.base_url.trim_end_matches('/'),
            kind,
            urlencoding_segment(tmdb_id)
        )
    }
}

fn urlencoding_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[async_trait]
impl IdResolver for TmdbResolver {
    async fn resolve_imdb_id(&self, media_type: MediaType, tmdb_id: &str) -> Result<Option<String>> {
        if let Some(imdb_id) = as_imdb_id(tmdb_id) {
            return Ok(Some(imdb_id.to_string()));
        }

        let key = (media_type, tmdb_id.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }

        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            warn!(tmdb_id, "TMDB API key not configured; cannot resolve IMDB id");
            return Ok(None);
        };

        let response = self
            .client
            .get(self.endpoint(media_type, tmdb_id))
            .query(&[("api_key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(tmdb_id, %media_type, "TMDB id not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::resolver(format!(
                "TMDB responded with status {status} for {media_type} {tmdb_id}"
            )));
        }

        let ids: ExternalIds = response.json().await?;
        let imdb_id = ids.imdb_id.filter(|id| !id.is_empty());
        if let Some(id) = &imdb_id {
            self.cache.insert(key, id.clone());
        }
        debug!(tmdb_id, imdb_id = ?imdb_id, "Resolved IMDB id");
        Ok(imdb_id)
    }
}
