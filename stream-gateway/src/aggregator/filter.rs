//! Stream filtering by minimum quality and excluded codecs.
//!
//! Filters are scoped: the aggregate path uses [`AGGREGATE_SCOPE`], the
//! single-provider path uses the provider name. A scope with no settings
//! lets every playable stream through.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stream_providers::media::{Stream, quality_score};
use tracing::debug;

/// Scope name used when filtering merged multi-provider results.
pub const AGGREGATE_SCOPE: &str = "aggregate";

/// Filter policy, keyed by scope.
///
/// ```json
/// {
///   "min_quality": { "aggregate": "720p", "slowhost": "1080p" },
///   "exclude_codecs": { "aggregate": ["hevc", "x265"] }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum quality label per scope. Streams scoring below it are dropped.
    pub min_quality: HashMap<String, String>,
    /// Codec tokens per scope. Matched case-insensitively against the
    /// stream title and quality label.
    pub exclude_codecs: HashMap<String, Vec<String>>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.min_quality.is_empty() && self.exclude_codecs.is_empty()
    }
}

/// Apply the policy of `scope` to `streams`, preserving order.
pub fn apply_filters(streams: Vec<Stream>, scope: &str, config: &FilterConfig) -> Vec<Stream> {
    let min_score = config
        .min_quality
        .get(scope)
        .map(|label| quality_score(Some(label)));

    let excluded: Vec<String> = config
        .exclude_codecs
        .get(scope)
        .map(|codecs| {
            codecs
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let before = streams.len();
    let kept: Vec<Stream> = streams
        .into_iter()
        .filter(|s| s.is_playable())
        .filter(|s| min_score.is_none_or(|min| quality_score(s.quality_label()) >= min))
        .filter(|s| excluded.is_empty() || !mentions_codec(s, &excluded))
        .collect();

    if kept.len() != before {
        debug!(scope, before, after = kept.len(), "Filtered streams");
    }
    kept
}

fn mentions_codec(stream: &Stream, codecs: &[String]) -> bool {
    let title = stream.title.to_lowercase();
    let quality = stream
        .quality
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    codecs
        .iter()
        .any(|codec| title.contains(codec.as_str()) || quality.contains(codec.as_str()))
}
