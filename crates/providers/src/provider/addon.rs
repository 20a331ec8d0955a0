//! Generic provider speaking the addon stream protocol.
//!
//! An addon exposes `GET {base}/stream/{type}/{id}.json` where `id` is an
//! IMDB id for movies and `{imdb}:{season}:{episode}` for series episodes.
//! The response carries a `streams` array; per-stream transport headers live
//! under `behaviorHints.proxyHeaders.request`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

use super::error::ProviderError;
use super::provider::{FetchCriteria, Provider};
use crate::media::{Stream, Subtitle, detect_quality, provider_rank};

#[derive(Debug, Deserialize)]
struct AddonStreamsResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddonStream {
    url: Option<String>,
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    subtitles: Vec<AddonSubtitle>,
    behavior_hints: Option<BehaviorHints>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BehaviorHints {
    proxy_headers: Option<ProxyHeaders>,
}

#[derive(Debug, Deserialize)]
struct ProxyHeaders {
    request: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct AddonSubtitle {
    url: String,
    lang: Option<String>,
}

pub struct AddonProvider {
    name: String,
    base_url: String,
    enabled: bool,
    client: Client,
}

impl AddonProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled: true,
            client,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn stream_url(&self, criteria: &FetchCriteria, imdb_id: &str) -> Result<url::Url, ProviderError> {
        let id = match criteria.episode_ref() {
            Some((season, episode)) => format!("{imdb_id}:{season}:{episode}"),
            None => imdb_id.to_string(),
        };
        let raw = format!(
            "{}/stream/{}/{}.json",
            self.base_url, criteria.media_type, id
        );
        url::Url::parse(&raw).map_err(|e| ProviderError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn convert(&self, stream: AddonStream) -> Option<Stream> {
        let url = stream.url.filter(|u| !u.is_empty())?;

        let title = stream
            .title
            .or(stream.description)
            .or_else(|| stream.name.clone())
            .unwrap_or_default();

        let quality = stream
            .name
            .as_deref()
            .and_then(detect_quality)
            .or_else(|| detect_quality(&title));

        let headers = stream
            .behavior_hints
            .and_then(|h| h.proxy_headers)
            .and_then(|h| h.request)
            .unwrap_or_default();

        let subtitles = stream
            .subtitles
            .into_iter()
            .map(|s| Subtitle {
                url: s.url,
                lang: s.lang.unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        let mut out = Stream::new(self.name.clone(), title, url)
            .with_headers(headers)
            .with_subtitles(subtitles);
        out.quality = quality;
        Some(out)
    }
}

#[async_trait]
impl Provider for AddonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<Stream>, ProviderError> {
        // The addon protocol is keyed by IMDB id only.
        let Some(imdb_id) = criteria.imdb_id.as_deref() else {
            debug!(provider = %self.name, tmdb_id = %criteria.tmdb_id, "No IMDB id, skipping");
            return Ok(Vec::new());
        };

        let url = self.stream_url(criteria, imdb_id)?;
        debug!(provider = %self.name, %url, "Fetching streams");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UpstreamStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: AddonStreamsResponse = serde_json::from_str(&body)?;

        let mut streams: Vec<Stream> = parsed
            .streams
            .into_iter()
            .filter_map(|s| self.convert(s))
            .collect();
        // Stable: equal ranks keep the addon's own order.
        streams.sort_by_key(|s| Reverse(provider_rank(s.quality_label())));

        debug!(provider = %self.name, count = streams.len(), "Fetched streams");
        Ok(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    async fn spawn_addon() -> String {
        async fn streams(Path((kind, id)): Path<(String, String)>) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "streams": [
                    { "name": "Addon\n720p", "title": format!("{kind} {id} small"), "url": "https://cdn.example.com/720.mp4" },
                    { "name": "Addon", "title": "Release 2160p HDR", "url": "https://cdn.example.com/4k.m3u8",
                      "behaviorHints": { "proxyHeaders": { "request": { "Referer": "https://example.com/" } } },
                      "subtitles": [ { "id": "1", "url": "https://cdn.example.com/en.vtt", "lang": "eng" } ] },
                    { "name": "Torrent only", "infoHash": "abc" }
                ]
            }))
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/stream/{kind}/{id}", get(streams))
            .route("/broken/stream/{kind}/{id}", get(|| async { StatusCode::BAD_GATEWAY }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_maps_and_ranks_streams() {
        let base = spawn_addon().await;
        let provider = AddonProvider::new("addon", format!("{base}/"), Client::new());

        let criteria = FetchCriteria::movie("603").with_imdb_id(Some("tt0133093".to_string()));
        let streams = provider.fetch(&criteria).await.unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].quality.as_deref(), Some("4K"));
        assert_eq!(streams[0].provider, "addon");
        assert!(streams[0].has_headers());
        assert_eq!(streams[0].subtitles[0].lang, "eng");
        assert_eq!(streams[1].quality.as_deref(), Some("720p"));
        assert_eq!(streams[1].title, "movie tt0133093.json small");
    }

    #[tokio::test]
    async fn test_series_id_includes_episode() {
        let base = spawn_addon().await;
        let provider = AddonProvider::new("addon", base, Client::new());

        let criteria =
            FetchCriteria::series("1399", 2, 5).with_imdb_id(Some("tt0944947".to_string()));
        let url = provider.stream_url(&criteria, "tt0944947").unwrap();
        assert!(url.as_str().ends_with("/stream/series/tt0944947:2:5.json"));

        let streams = provider.fetch(&criteria).await.unwrap();
        assert_eq!(streams[1].title, "series tt0944947:2:5.json small");
    }

    #[tokio::test]
    async fn test_missing_imdb_id_yields_nothing() {
        let provider = AddonProvider::new("addon", "http://127.0.0.1:9", Client::new());
        let streams = provider.fetch(&FetchCriteria::movie("603")).await.unwrap();
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let base = spawn_addon().await;
        let provider = AddonProvider::new("addon", format!("{base}/broken"), Client::new());

        let criteria = FetchCriteria::movie("603").with_imdb_id(Some("tt0133093".to_string()));
        let err = provider.fetch(&criteria).await.unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamStatus(502)));
    }
}
