//! Relay fetch endpoint.
//!
//! Players that cannot set request headers load the URLs produced by the
//! relay rewriter. This route rebuilds the upstream request from the
//! `url` and `headers` query parameters and streams the body back with
//! `Range` support.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::TryStreamExt;
use serde::Deserialize;
use stream_providers::provider::create_client_builder;

use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::require_session;
use crate::api::server::AppState;
use crate::relay::guard::{self, PublicDnsResolver};

const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
const ALLOW_HEADERS: &str = "Range";
const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";

type ClientSlot = OnceLock<Result<reqwest::Client, String>>;

fn relay_client(allow_private: bool) -> ApiResult<&'static reqwest::Client> {
    // No overall request timeout: relayed media responses are long-lived.
    static PUBLIC: ClientSlot = OnceLock::new();
    static PRIVATE: ClientSlot = OnceLock::new();

    let slot = if allow_private { &PRIVATE } else { &PUBLIC };
    let client = slot.get_or_init(|| {
        let mut builder = create_client_builder(None)
            .tcp_nodelay(true)
            .pool_max_idle_per_host(20)
            .redirect(guard::redirect_policy(allow_private));
        if !allow_private {
            builder = builder.dns_resolver(Arc::new(PublicDnsResolver));
        }
        builder.build().map_err(|e| e.to_string())
    });

    match client {
        Ok(client) => Ok(client),
        Err(message) => Err(ApiError::internal(message.clone())),
    }
}

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    pub url: String,
    pub headers: Option<String>,
}

/// Create the relay router.
///
/// `GET` goes through the session guard; preflight does not, since
/// browsers send it without cookies.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        // Mounted under `/relay` by the main router.
        .route(
            "/stream",
            get(relay_get)
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_session,
                ))
                .options(relay_options),
        )
}

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

async fn relay_options() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    cors_headers(&mut headers);
    (StatusCode::NO_CONTENT, headers)
}

/// Parse and vet the target URL.
fn validate_target(raw: &str, allow_private: bool) -> ApiResult<url::Url> {
    let target =
        url::Url::parse(raw).map_err(|e| ApiError::bad_request(format!("Invalid url: {e}")))?;
    guard::check_target(&target, allow_private)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(target)
}

/// Upstream request headers: the relayed map plus the client's `Range`.
fn upstream_headers(
    raw_headers: Option<&str>,
    incoming: &HeaderMap,
) -> ApiResult<reqwest::header::HeaderMap> {
    let custom: BTreeMap<String, String> = match raw_headers.filter(|h| !h.is_empty()) {
        Some(raw) => {
            serde_json::from_str(raw).map_err(|_| ApiError::bad_request("Invalid headers JSON"))?
        }
        None => BTreeMap::new(),
    };

    let mut out = reqwest::header::HeaderMap::new();
    for (k, v) in custom {
        let lower = k.to_ascii_lowercase();
        if lower == "host" || lower == "connection" {
            continue;
        }
        let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
            .map_err(|_| ApiError::bad_request("Invalid header name"))?;
        let value =
            HeaderValue::from_str(&v).map_err(|_| ApiError::bad_request("Invalid header value"))?;
        out.insert(name, value);
    }

    if let Some(range) = incoming.get(header::RANGE) {
        out.insert(reqwest::header::RANGE, range.clone());
    }

    Ok(out)
}

/// `GET /relay/stream?url=&headers=`
pub async fn relay_get(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
    req: Request,
) -> ApiResult<Response> {
    let allow_private = state.engine.relay_config().allow_private_targets;
    let target = validate_target(&query.url, allow_private)?;
    let headers = upstream_headers(query.headers.as_deref(), req.headers())?;

    tracing::debug!(host = ?target.host_str(), "Relaying stream request");

    let upstream = relay_client(allow_private)?
        .get(target)
        .headers(headers)
        .send()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Relay request failed: {e}")))?;

    let status = upstream.status();

    let mut out_headers = HeaderMap::new();
    let allowed = [
        header::CONTENT_TYPE,
        header::CONTENT_LENGTH,
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
        header::CACHE_CONTROL,
        header::ETAG,
        header::LAST_MODIFIED,
        header::DATE,
    ];
    for key in allowed {
        if let Some(value) = upstream.headers().get(key.as_str()) {
            out_headers.insert(key, value.clone());
        }
    }
    cors_headers(&mut out_headers);

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    let body = axum::body::Body::from_stream(stream);

    let mut response = (status, body).into_response();
    *response.headers_mut() = out_headers;
    Ok(response)
}
