use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::state::AppState;
use crate::domain::{ports::StoreStats, HealthState, ProviderDescriptor};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub index: StoreStats,
    pub providers: Vec<ProviderDescriptor>,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Ready while the index is readable and at least one provider is not
/// unavailable.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let index = state.store.stats().map_err(|e| {
        tracing::error!(error = %e, "Index stats unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    let providers = state.orchestrator.registry().descriptors();

    let is_ready = providers
        .iter()
        .any(|p| p.health != HealthState::Unavailable);
    if !is_ready {
        tracing::warn!(providers = providers.len(), "No provider available");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadinessResponse {
        status: "ready".into(),
        index,
        providers,
    }))
}
