//! Runtime statistics.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::models::StatsResponse;
use crate::api::server::AppState;

/// Create the stats router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

/// `GET /api/stats`
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        metrics: state.engine.metrics().snapshot(),
        tracked_login_identities: state.auth.governor().len(),
        active_sessions: state.auth.sessions().len(),
    })
}
