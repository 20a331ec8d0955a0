//! Rewrites provider URLs into same-origin relay URLs.
//!
//! Clients such as browser players cannot attach custom request headers,
//! so a stream that needs `Referer`/`Origin`/cookies is re-addressed to
//! `/relay/stream` on this gateway. The relay URL carries the original URL
//! and the header map; the relay endpoint rebuilds the upstream request.

use stream_providers::media::Stream;
use tracing::debug;

use super::RelayConfig;

/// Path of the relay fetch endpoint, relative to the gateway origin.
pub const RELAY_PATH: &str = "/relay/stream";

/// Build the relay URL for a target URL and its headers.
pub fn relay_url(origin_base: &str, stream: &Stream) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("url", &stream.url);
    if let Some(headers) = stream.headers.as_ref().filter(|h| !h.is_empty()) {
        // BTreeMap keeps the encoding stable for identical inputs.
        let encoded = serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string());
        query.append_pair("headers", &encoded);
    }
    format!(
        "{}{}?{}",
        origin_base.trim_end_matches('/'),
        RELAY_PATH,
        query.finish()
    )
}

/// Re-address streams through the relay.
///
/// Streams with headers are always rewritten; header-less streams only when
/// `relay_headerless` is set. No returned stream carries headers.
pub fn rewrite(streams: Vec<Stream>, origin_base: &str, config: &RelayConfig) -> Vec<Stream> {
    let mut rewritten = 0usize;
    let out: Vec<Stream> = streams
        .into_iter()
        .map(|stream| {
            if stream.has_headers() || config.relay_headerless {
                rewritten += 1;
                Stream {
                    url: relay_url(origin_base, &stream),
                    headers: None,
                    ..stream
                }
            } else {
                stream.without_headers()
            }
        })
        .collect();

    debug!(rewritten, total = out.len(), "Relay rewrite applied");
    out
}
