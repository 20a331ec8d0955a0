//! API route modules.

pub mod auth;
pub mod health;
pub mod providers;
pub mod relay;
pub mod stats;
pub mod streams;

use axum::{Router, middleware};

use crate::api::middleware::require_session;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let streams = streams::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_session,
    ));

    let mut router = Router::new()
        .nest("/api/streams", streams)
        .nest("/api/providers", providers::router())
        .nest("/api/stats", stats::router())
        .nest("/auth", auth::router())
        .nest("/health", health::router());

    // Only reachable when stream URLs are actually rewritten to it.
    if state.engine.relay_config().enabled {
        router = router.nest("/relay", relay::router(&state));
    }

    router.with_state(state)
}
