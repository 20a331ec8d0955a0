//! Provider listing.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::models::{ProviderInfo, ProvidersResponse};
use crate::api::server::AppState;

/// Create the providers router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_providers))
}

/// `GET /api/providers`, in registration order.
async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .engine
        .registry()
        .list()
        .iter()
        .map(|p| ProviderInfo {
            name: p.name().to_string(),
            enabled: p.is_enabled(),
        })
        .collect();

    Json(ProvidersResponse {
        success: true,
        providers,
    })
}
