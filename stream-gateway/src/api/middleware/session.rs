//! Session cookie guard.
//!
//! Applied to the stream routes. A no-op unless session enforcement is
//! enabled and at least one user is configured.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;
use crate::api::extract::session_token;
use crate::api::server::AppState;

/// Reject requests without a live session with 401 `UNAUTHORIZED`.
///
/// The validated [`crate::auth::Session`] is placed in the request
/// extensions for downstream handlers.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.session_required() {
        return Ok(next.run(request).await);
    }

    let session = session_token(request.headers())
        .and_then(|token| state.auth.session(&token))
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "Request without valid session");
            ApiError::unauthorized("A valid session is required")
        })?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
