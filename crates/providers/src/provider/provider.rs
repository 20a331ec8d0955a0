use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::error::ProviderError;
use crate::media::Stream;

/// Kind of catalog item being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path segment is not a known media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMediaType(pub String);

impl fmt::Display for InvalidMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid media type '{}', expected movie or series", self.0)
    }
}

impl std::error::Error for InvalidMediaType {}

impl FromStr for MediaType {
    type Err = InvalidMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "series" => Ok(MediaType::Series),
            other => Err(InvalidMediaType(other.to_string())),
        }
    }
}

/// Lookup criteria handed to every provider of one aggregation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCriteria {
    // Catalog (TMDB) identifier as received from the client
    pub tmdb_id: String,
    // Resolved IMDB identifier, when the resolver found one
    pub imdb_id: Option<String>,
    pub media_type: MediaType,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl FetchCriteria {
    pub fn movie(tmdb_id: impl Into<String>) -> Self {
        Self {
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            media_type: MediaType::Movie,
            season: None,
            episode: None,
        }
    }

    pub fn series(tmdb_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            media_type: MediaType::Series,
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn with_imdb_id(mut self, imdb_id: Option<String>) -> Self {
        self.imdb_id = imdb_id;
        self
    }

    /// Season and episode, only meaningful for series lookups.
    pub fn episode_ref(&self) -> Option<(u32, u32)> {
        match (self.media_type, self.season, self.episode) {
            (MediaType::Series, Some(season), Some(episode)) => Some((season, episode)),
            _ => None,
        }
    }
}

/// An external stream source.
///
/// Implementations are registered once at startup and shared across
/// requests, so `fetch` takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<Stream>, ProviderError>;
}
