use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// A subtitle track attached to a stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subtitle {
    pub url: String,
    // Language label as reported by the provider, e.g. "eng", "English"
    pub lang: String,
}

/// A candidate playable link returned by a provider.
///
/// Streams are treated as immutable values once a provider produced them.
/// Consumers filter, re-map or strip fields, producing new values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    // Display title, usually the release name
    pub title: String,
    // Url of the stream, empty means unplayable
    pub url: String,
    // Free-text quality label, e.g. "1080p", "4K", "SD"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    // Name of the provider that produced this stream
    pub provider: String,
    // Request headers needed to fetch `url` directly (Referer, Origin, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
}

impl Stream {
    pub fn new(
        provider: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            quality: None,
            provider: provider.into(),
            headers: None,
            subtitles: Vec::new(),
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = if headers.is_empty() {
            None
        } else {
            Some(headers)
        };
        self
    }

    pub fn with_subtitles(mut self, subtitles: Vec<Subtitle>) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Returns a copy of this stream without transport headers.
    pub fn without_headers(&self) -> Self {
        Self {
            headers: None,
            ..self.clone()
        }
    }

    #[inline]
    pub fn is_playable(&self) -> bool {
        !self.url.is_empty()
    }

    #[inline]
    pub fn has_headers(&self) -> bool {
        self.headers.as_ref().is_some_and(|h| !h.is_empty())
    }

    pub fn quality_label(&self) -> Option<&str> {
        self.quality.as_deref()
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.provider,
            self.quality.as_deref().unwrap_or("unknown"),
            self.title
        )
    }
}
