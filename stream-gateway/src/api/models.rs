//! API request and response bodies.

use serde::{Deserialize, Serialize};
use stream_providers::media::Stream;

use crate::aggregator::ProviderTimings;
use crate::metrics::MetricsSnapshot;

/// Login request body. Fields are optional so that missing ones map to
/// `MISSING_CREDENTIALS` instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "expiresAt")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// How a direct-mode answer is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMode {
    /// `text/plain` with a comment line and the URL.
    Text,
    /// `302` to the URL.
    Redirect,
}

/// Query parameters of the stream routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Present (any value but `redirect`, `false`, `0`) → plain-text answer.
    pub direct: Option<String>,
    /// Preferred provider for direct mode and the provider filter.
    pub provider: Option<String>,
}

impl StreamQuery {
    pub fn direct_mode(&self) -> Option<DirectMode> {
        match self.direct.as_deref().map(str::trim) {
            None | Some("false") | Some("0") => None,
            Some("redirect") => Some(DirectMode::Redirect),
            Some(_) => Some(DirectMode::Text),
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamsResponse {
    pub success: bool,
    pub tmdb_id: String,
    pub imdb_id: Option<String>,
    pub count: usize,
    pub provider_timings: ProviderTimings,
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub success: bool,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub success: bool,
    pub uptime_secs: u64,
    pub metrics: MetricsSnapshot,
    pub tracked_login_identities: usize,
    pub active_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub providers: usize,
}
