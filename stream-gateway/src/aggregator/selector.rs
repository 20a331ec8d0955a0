//! Best-stream selection.
//!
//! Candidates are ranked by quality score only. Sorting is stable, so among
//! equally scored streams the one that came first (provider selection order,
//! then the provider's own order) wins.

use std::cmp::Reverse;

use stream_providers::media::{Stream, quality_score};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// A preferred provider was requested but contributed no streams.
    #[error("no streams from provider '{0}'")]
    NoMatch(String),
}

/// Sort candidates best-first, optionally restricted to one provider.
pub fn rank_streams<'a>(
    streams: &'a [Stream],
    preferred_provider: Option<&str>,
) -> Result<Vec<&'a Stream>, SelectionError> {
    let mut candidates: Vec<&Stream> = match preferred_provider {
        Some(provider) => {
            let matching: Vec<&Stream> =
                streams.iter().filter(|s| s.provider == provider).collect();
            if matching.is_empty() {
                return Err(SelectionError::NoMatch(provider.to_string()));
            }
            matching
        }
        None => streams.iter().collect(),
    };

    candidates.sort_by_key(|s| Reverse(quality_score(s.quality_label())));
    Ok(candidates)
}

/// Pick the single best stream.
///
/// Returns `Ok(None)` for an empty input and `Err(NoMatch)` when the
/// preferred provider has nothing, so callers can tell the two apart.
pub fn pick_best_stream<'a>(
    streams: &'a [Stream],
    preferred_provider: Option<&str>,
) -> Result<Option<&'a Stream>, SelectionError> {
    Ok(rank_streams(streams, preferred_provider)?.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(provider: &str, quality: Option<&str>, url: &str) -> Stream {
        let mut s = Stream::new(provider, "title", url);
        s.quality = quality.map(String::from);
        s
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(pick_best_stream(&[], None), Ok(None));
    }

    #[test]
    fn test_picks_highest_quality() {
        let streams = vec![
            stream("a", Some("720p"), "u1"),
            stream("b", Some("1080p"), "u2"),
            stream("c", None, "u3"),
        ];
        let best = pick_best_stream(&streams, None).unwrap().unwrap();
        assert_eq!(best.url, "u2");
    }

    #[test]
    fn test_unknown_preferred_provider_is_distinct_from_empty() {
        let streams = vec![stream("a", Some("720p"), "u1")];
        assert_eq!(
            pick_best_stream(&streams, Some("x")),
            Err(SelectionError::NoMatch("x".to_string()))
        );
        // Even with an empty list a preferred provider yields NoMatch.
        assert!(pick_best_stream(&[], Some("x")).is_err());
    }

    #[test]
    fn test_preferred_provider_restricts_candidates() {
        let streams = vec![
            stream("a", Some("4K"), "u1"),
            stream("b", Some("480p"), "u2"),
            stream("b", Some("720p"), "u3"),
        ];
        let best = pick_best_stream(&streams, Some("b")).unwrap().unwrap();
        assert_eq!(best.url, "u3");
    }

    #[test]
    fn test_ties_keep_original_order() {
        let streams = vec![
            stream("b", Some("1080p"), "first"),
            stream("a", Some("1080p"), "second"),
            stream("c", Some("720p"), "third"),
        ];
        for _ in 0..50 {
            let best = pick_best_stream(&streams, None).unwrap().unwrap();
            assert_eq!(best.url, "first");
        }

        let ranked = rank_streams(&streams, None).unwrap();
        let urls: Vec<&str> = ranked.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["first", "second", "third"]);
    }
}
