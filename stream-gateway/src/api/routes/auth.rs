//! Authentication routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ClientIdentity, session_token};
use crate::api::models::{LoginRequest, LoginResponse, SessionResponse};
use crate::api::server::AppState;
use crate::auth::{AuthError, LoginOutcome, SESSION_COOKIE};

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
}

fn auth_error_to_api_error(err: AuthError) -> ApiError {
    match err {
        AuthError::MissingCredentials => ApiError::new(
            StatusCode::BAD_REQUEST,
            "MISSING_CREDENTIALS",
            "Username and password are required",
        ),
        AuthError::Internal(msg) => {
            tracing::error!("Auth internal error: {}", msg);
            ApiError::internal("Authentication failed")
        }
    }
}

fn session_cookie(token: &str, max_age: u64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}"
    ))
    .map_err(|e| ApiError::internal(format!("Invalid session cookie: {}", e)))
}

/// `POST /auth/login`
async fn login(
    State(state): State<AppState>,
    identity: ClientIdentity,
    body: Bytes,
) -> ApiResult<Response> {
    // A malformed body is treated like an empty one.
    let request: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let outcome = state
        .auth
        .login(identity.as_str(), &username, &password)
        .await
        .map_err(auth_error_to_api_error)?;

    match outcome {
        LoginOutcome::Success(session) => {
            let cookie = session_cookie(&session.token, state.auth.sessions().ttl_secs())?;
            let body = Json(LoginResponse {
                success: true,
                username: session.username,
            });
            Ok(([(SET_COOKIE, cookie)], body).into_response())
        }
        LoginOutcome::TooManyAttempts { retry_after_secs } => Err(ApiError::too_many_requests(
            "TOO_MANY_ATTEMPTS",
            "Too many failed login attempts, try again later",
        )
        .with_retry_after(retry_after_secs)),
        LoginOutcome::Locked { retry_after_secs } => Err(ApiError::too_many_requests(
            "LOCKED",
            "Too many failed login attempts, login is locked",
        )
        .with_retry_after(retry_after_secs)),
        LoginOutcome::InvalidCredentials { remaining } => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid username or password",
        )
        .with_field("remaining", remaining)),
    }
}

/// `POST /auth/logout`
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = session_token(&headers) {
        state.auth.logout(&token);
    }
    let cookie = session_cookie("", 0)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response())
}

/// `GET /auth/session`
async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let session = session_token(&headers).and_then(|token| state.auth.session(&token));
    Json(SessionResponse {
        authenticated: session.is_some(),
        username: session.as_ref().map(|s| s.username.clone()),
        expires_at: session.map(|s| s.expires_at),
    })
}
