//! Concurrent multi-provider aggregation.

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use futures::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use stream_providers::media::Stream;
use stream_providers::provider::{FetchCriteria, MediaType, Provider, ProviderRegistry};
use tracing::{debug, info, warn};

use super::filter::{AGGREGATE_SCOPE, FilterConfig, apply_filters};
use crate::metrics::MetricsCollector;
use crate::relay::{self, RelayConfig};
use crate::resolver::IdResolver;
use crate::{Error, Result};

/// One aggregation request, already validated.
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub media_type: MediaType,
    pub tmdb_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Restrict the fan-out to providers with exactly this name.
    pub provider_filter: Option<String>,
    /// Origin used for relay URLs; derived from config when absent.
    pub origin: Option<String>,
}

impl AggregateRequest {
    pub fn new(media_type: MediaType, tmdb_id: impl Into<String>) -> Self {
        Self {
            media_type,
            tmdb_id: tmdb_id.into(),
            season: None,
            episode: None,
            provider_filter: None,
            origin: None,
        }
    }

    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season = season;
        self.episode = episode;
        self
    }

    pub fn with_provider_filter(mut self, provider: Option<String>) -> Self {
        self.provider_filter = provider;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Outcome of one provider call. `elapsed_ms` is `None` when the call failed.
#[derive(Debug, Clone)]
pub struct ProviderCallResult {
    pub provider: String,
    pub elapsed_ms: Option<u64>,
    pub streams: Vec<Stream>,
}

/// Provider timings in fan-out order, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderTimings(pub Vec<(String, Option<u64>)>);

impl ProviderTimings {
    pub fn get(&self, provider: &str) -> Option<Option<u64>> {
        self.0
            .iter()
            .find(|(name, _)| name == provider)
            .map(|(_, ms)| *ms)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ProviderTimings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ms) in &self.0 {
            map.serialize_entry(name, ms)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub streams: Vec<Stream>,
    pub provider_timings: ProviderTimings,
    pub imdb_id: Option<String>,
}

/// Fans a request out to the selected providers and merges the results.
pub struct AggregationEngine {
    registry: Arc<ProviderRegistry>,
    resolver: Arc<dyn IdResolver>,
    metrics: Arc<MetricsCollector>,
    default_providers: Vec<String>,
    filters: FilterConfig,
    relay: RelayConfig,
}

impl AggregationEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        resolver: Arc<dyn IdResolver>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            resolver,
            metrics,
            default_providers: Vec::new(),
            filters: FilterConfig::default(),
            relay: RelayConfig::default(),
        }
    }

    pub fn with_default_providers(mut self, names: Vec<String>) -> Self {
        self.default_providers = names;
        self
    }

    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn relay_config(&self) -> &RelayConfig {
        &self.relay
    }

    /// Providers a request fans out to, in order.
    ///
    /// Configured defaults (when any) else every registered provider.
    /// Default names that are not registered are skipped.
    fn selected_providers(&self, provider_filter: Option<&str>) -> Vec<Arc<dyn Provider>> {
        let base: Vec<Arc<dyn Provider>> = if self.default_providers.is_empty() {
            self.registry.list().to_vec()
        } else {
            self.default_providers
                .iter()
                .filter_map(|name| {
                    let provider = self.registry.get(name);
                    if provider.is_none() {
                        warn!(provider = %name, "Default provider is not registered");
                    }
                    provider
                })
                .collect()
        };

        match provider_filter {
            Some(name) => base.into_iter().filter(|p| p.name() == name).collect(),
            None => base,
        }
    }

    /// Aggregate over the default provider set.
    pub async fn aggregate(&self, request: AggregateRequest) -> Result<AggregateResult> {
        let providers = self.selected_providers(request.provider_filter.as_deref());
        self.run(providers, AGGREGATE_SCOPE, request).await
    }

    /// Aggregate over a single named provider.
    pub async fn aggregate_provider(
        &self,
        provider_name: &str,
        request: AggregateRequest,
    ) -> Result<AggregateResult> {
        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| Error::ProviderNotFound(provider_name.to_string()))?;
        if !provider.is_enabled() {
            return Err(Error::ProviderDisabled(provider_name.to_string()));
        }
        self.run(vec![provider], provider_name, request).await
    }

    async fn run(
        &self,
        providers: Vec<Arc<dyn Provider>>,
        scope: &str,
        request: AggregateRequest,
    ) -> Result<AggregateResult> {
        self.metrics.record_request();

        let imdb_id = match self
            .resolver
            .resolve_imdb_id(request.media_type, &request.tmdb_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.metrics.record_error(e.to_string());
                return Err(e);
            }
        };

        let criteria = FetchCriteria {
            tmdb_id: request.tmdb_id.clone(),
            imdb_id: imdb_id.clone(),
            media_type: request.media_type,
            season: request.season,
            episode: request.episode,
        };

        let active: Vec<Arc<dyn Provider>> = providers
            .into_iter()
            .filter(|p| {
                let enabled = p.is_enabled();
                if !enabled {
                    debug!(provider = p.name(), "Skipping disabled provider");
                }
                enabled
            })
            .collect();

        // join_all yields results in input order regardless of completion order.
        let calls = join_all(active.iter().map(|p| self.call_provider(p.as_ref(), &criteria))).await;

        let mut timings = Vec::with_capacity(calls.len());
        let mut streams = Vec::new();
        for call in calls {
            timings.push((call.provider, call.elapsed_ms));
            streams.extend(call.streams);
        }

        let mut streams = apply_filters(streams, scope, &self.filters);

        if self.relay.enabled {
            let origin = request
                .origin
                .clone()
                .unwrap_or_else(|| relay::origin_base(&HeaderMap::new(), &self.relay));
            streams = relay::rewrite(streams, &origin, &self.relay);
        }

        self.metrics.record_streams_returned(streams.len() as u64);
        info!(
            tmdb_id = %request.tmdb_id,
            media_type = %request.media_type,
            providers = timings.len(),
            streams = streams.len(),
            "Aggregation finished"
        );

        Ok(AggregateResult {
            streams,
            provider_timings: ProviderTimings(timings),
            imdb_id,
        })
    }

    async fn call_provider(
        &self,
        provider: &dyn Provider,
        criteria: &FetchCriteria,
    ) -> ProviderCallResult {
        let name = provider.name().to_string();
        self.metrics.record_provider_call(name.as_str());

        let started = Instant::now();
        match provider.fetch(criteria).await {
            Ok(streams) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.metrics
                    .record_provider_duration(name.as_str(), elapsed_ms);
                debug!(provider = %name, count = streams.len(), elapsed_ms, "Provider returned");
                ProviderCallResult {
                    provider: name,
                    elapsed_ms: Some(elapsed_ms),
                    streams,
                }
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "Provider fetch failed");
                self.metrics.record_provider_failure(name.as_str());
                ProviderCallResult {
                    provider: name,
                    elapsed_ms: None,
                    streams: Vec::new(),
                }
            }
        }
    }
}
