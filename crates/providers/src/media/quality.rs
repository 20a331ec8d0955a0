//! Quality label scoring.
//!
//! Providers report quality as free text ("1080p", "4K HDR", "WEB-DL 720p",
//! "SD"...). Scoring maps such a label onto an ordinal rank using
//! case-insensitive substring matching against an ordered tier table. The
//! first tier with a matching token wins.

use regex::Regex;
use std::sync::LazyLock;

/// Ordered tier table: tokens (lowercase) and the score they map to.
const QUALITY_TIERS: &[(&[&str], u32)] = &[
    (&["4k", "2160"], 100),
    (&["1440", "2k"], 90),
    (&["1080"], 80),
    (&["720"], 60),
    (&["480", "sd"], 40),
];

/// Score of labels that match no tier, including absent and empty labels.
pub const DEFAULT_QUALITY_SCORE: u32 = 20;

static QUALITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(2160p|4k|uhd|1440p|2k|1080p|720p|480p|360p)\b").unwrap()
});

/// Map a quality label to the gateway ranking scale (20..=100).
pub fn quality_score(label: Option<&str>) -> u32 {
    let Some(label) = label else {
        return DEFAULT_QUALITY_SCORE;
    };
    let label = label.to_lowercase();

    QUALITY_TIERS
        .iter()
        .find(|(tokens, _)| tokens.iter().any(|t| label.contains(t)))
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_QUALITY_SCORE)
}

/// Provider-side rank (2..=10). Same tier ordering as [`quality_score`].
pub fn provider_rank(label: Option<&str>) -> u8 {
    match quality_score(label) {
        100 => 10,
        90 => 9,
        80 => 8,
        60 => 6,
        40 => 4,
        _ => 2,
    }
}

/// Pull a resolution label out of a release name or description.
pub fn detect_quality(text: &str) -> Option<String> {
    let found = QUALITY_REGEX.find(text)?.as_str();
    let label = match found.to_ascii_lowercase().as_str() {
        "4k" | "uhd" | "2160p" => "4K".to_string(),
        "2k" => "2K".to_string(),
        other => other.to_string(),
    };
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_ordering() {
        assert!(quality_score(Some("4K")) > quality_score(Some("1080p")));
        assert!(quality_score(Some("1080p")) > quality_score(Some("720p")));
        assert!(quality_score(Some("720p")) > quality_score(Some("480p")));
        assert!(quality_score(Some("480p")) > quality_score(None));
        assert_eq!(quality_score(None), quality_score(Some("")));
    }

    #[test]
    fn test_score_table() {
        assert_eq!(quality_score(Some("2160p")), 100);
        assert_eq!(quality_score(Some("4k hdr")), 100);
        assert_eq!(quality_score(Some("1440p")), 90);
        assert_eq!(quality_score(Some("2K")), 90);
        assert_eq!(quality_score(Some("WEB-DL 1080p")), 80);
        assert_eq!(quality_score(Some("720p")), 60);
        assert_eq!(quality_score(Some("SD")), 40);
        assert_eq!(quality_score(Some("cam")), DEFAULT_QUALITY_SCORE);
    }

    #[test]
    fn test_provider_rank_preserves_ordering() {
        let labels = [
            Some("4K"),
            Some("1440p"),
            Some("1080p"),
            Some("720p"),
            Some("480p"),
            None,
        ];
        for pair in labels.windows(2) {
            assert!(quality_score(pair[0]) > quality_score(pair[1]));
            assert!(provider_rank(pair[0]) > provider_rank(pair[1]));
        }
        assert_eq!(provider_rank(Some("2160p")), 10);
        assert_eq!(provider_rank(Some("unknown")), 2);
    }

    #[test]
    fn test_detect_quality() {
        assert_eq!(
            detect_quality("Movie.2021.1080p.WEB-DL.x264").as_deref(),
            Some("1080p")
        );
        assert_eq!(detect_quality("Movie UHD HDR").as_deref(), Some("4K"));
        assert_eq!(detect_quality("[720P] Movie").as_deref(), Some("720p"));
        assert!(detect_quality("Movie CAM").is_none());
    }
}
