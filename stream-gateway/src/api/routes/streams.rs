//! Stream aggregation routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/streams/{type}/{tmdb_id}` | Aggregate over the default providers |
//! | GET | `/api/streams/{provider}/{type}/{tmdb_id}` | Query a single provider |
//!
//! `?direct` answers with the single best stream as plain text,
//! `?direct=redirect` with a `302` to it.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use stream_providers::media::Stream;
use stream_providers::provider::MediaType;

use crate::aggregator::{AggregateRequest, AggregateResult, pick_best_stream};
use crate::api::error::ApiResult;
use crate::api::models::{DirectMode, StreamQuery, StreamsResponse};
use crate::api::server::AppState;
use crate::error::Error;
use crate::relay;

/// Create the streams router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}/{tmdb_id}", get(aggregate_streams))
        .route("/{provider}/{kind}/{tmdb_id}", get(provider_streams))
}

fn parse_media_type(kind: &str) -> Result<MediaType, Error> {
    Ok(kind.parse::<MediaType>()?)
}

fn build_request(
    state: &AppState,
    headers: &HeaderMap,
    media_type: MediaType,
    tmdb_id: &str,
    query: &StreamQuery,
) -> AggregateRequest {
    let origin = relay::origin_base(headers, state.engine.relay_config());
    AggregateRequest::new(media_type, tmdb_id)
        .with_episode(query.season, query.episode)
        .with_origin(origin)
}

/// `GET /api/streams/{type}/{tmdb_id}`
async fn aggregate_streams(
    State(state): State<AppState>,
    Path((kind, tmdb_id)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let media_type = parse_media_type(&kind)?;
    let direct = query.direct_mode();

    let mut request = build_request(&state, &headers, media_type, &tmdb_id, &query);
    // In direct mode the provider is a preference for selection, otherwise a filter.
    if direct.is_none() {
        request = request.with_provider_filter(query.provider().map(String::from));
    }

    let result = state.engine.aggregate(request).await?;
    Ok(respond(result, &tmdb_id, direct, query.provider()))
}

/// `GET /api/streams/{provider}/{type}/{tmdb_id}`
async fn provider_streams(
    State(state): State<AppState>,
    Path((provider, kind, tmdb_id)): Path<(String, String, String)>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let media_type = parse_media_type(&kind)?;
    let request = build_request(&state, &headers, media_type, &tmdb_id, &query);

    let result = state.engine.aggregate_provider(&provider, request).await?;
    Ok(respond(result, &tmdb_id, query.direct_mode(), None))
}

fn respond(
    result: AggregateResult,
    tmdb_id: &str,
    direct: Option<DirectMode>,
    preferred_provider: Option<&str>,
) -> Response {
    let Some(mode) = direct else {
        return Json(StreamsResponse {
            success: true,
            tmdb_id: tmdb_id.to_string(),
            imdb_id: result.imdb_id,
            count: result.streams.len(),
            provider_timings: result.provider_timings,
            streams: result.streams,
        })
        .into_response();
    };

    let best = match pick_best_stream(&result.streams, preferred_provider) {
        Ok(Some(stream)) => stream,
        Ok(None) => return plain_text(StatusCode::NOT_FOUND, "No stream found".to_string()),
        Err(e) => return plain_text(StatusCode::NOT_FOUND, e.to_string()),
    };

    match mode {
        DirectMode::Redirect => {
            (StatusCode::FOUND, [(header::LOCATION, best.url.clone())]).into_response()
        }
        DirectMode::Text => plain_text(StatusCode::OK, direct_body(best, tmdb_id)),
    }
}

/// `# {provider} • {quality} • {tmdb_id}` followed by the URL.
fn direct_body(stream: &Stream, tmdb_id: &str) -> String {
    format!(
        "# {} • {} • {}\n{}",
        stream.provider,
        stream.quality_label().unwrap_or("unknown"),
        tmdb_id,
        stream.url
    )
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::test_support;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use stream_providers::provider::{FetchCriteria, Provider, ProviderError, ProviderRegistry};
    use tower::ServiceExt;

    struct Fixed {
        name: &'static str,
        enabled: bool,
        streams: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<Stream>, ProviderError> {
            assert_eq!(criteria.imdb_id.as_deref(), Some("tt603"));
            Ok(self
                .streams
                .iter()
                .map(|(quality, url)| Stream::new(self.name, *quality, *url).with_quality(*quality))
                .collect())
        }
    }

    fn app() -> Router {
        let mut registry = ProviderRegistry::new();
        for (name, enabled, streams) in [
            ("a", true, vec![("720p", "u1")]),
            ("b", true, vec![("1080p", "u2")]),
            ("off", false, vec![("4K", "u3")]),
        ] {
            registry
                .register(Arc::new(Fixed {
                    name,
                    enabled,
                    streams,
                }))
                .unwrap();
        }
        Router::new()
            .nest("/api/streams", router())
            .with_state(test_support::state(registry))
    }

    async fn get(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_direct_text_picks_best() {
        let response = get("/api/streams/movie/603?direct").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(text(response).await, "# b • 1080p • 603\nu2");
    }

    #[tokio::test]
    async fn test_direct_redirect() {
        let response = get("/api/streams/movie/603?direct=redirect").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "u2");
    }

    #[tokio::test]
    async fn test_direct_with_preferred_provider() {
        let response = get("/api/streams/movie/603?direct&provider=a").await;
        assert_eq!(text(response).await, "# a • 720p • 603\nu1");

        let response = get("/api/streams/movie/603?direct&provider=zzz").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_mode() {
        let response = get("/api/streams/movie/603").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["tmdbId"], "603");
        assert_eq!(body["imdbId"], "tt603");
        assert_eq!(body["count"], 2);
        assert!(body["providerTimings"].get("off").is_none());
        assert_eq!(body["streams"][0]["url"], "u1");

        let response = get("/api/streams/movie/603?provider=b").await;
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_invalid_type() {
        let response = get("/api/streams/tv/603").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["error"], "INVALID_TYPE");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_single_provider_route() {
        let response = get("/api/streams/b/movie/603?direct").await;
        assert_eq!(text(response).await, "# b • 1080p • 603\nu2");

        let response = get("/api/streams/nope/movie/603").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["error"], "PROVIDER_NOT_FOUND");

        let response = get("/api/streams/off/movie/603").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = get("/api/streams/nope/tv/603").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
