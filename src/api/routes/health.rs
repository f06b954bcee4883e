//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /api/health/live - Liveness probe (process is alive)
//! - GET /api/health/ready - Readiness probe (ready to serve traffic)
//! - GET /api/health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /api/health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /api/health/ready
///
/// Returns 503 once the store has begun shutting down.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.store.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /api/health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.store.stats().await;
    let store_ok = !state.store.is_shutting_down();

    Json(HealthResponse {
        status: if store_ok { "healthy" } else { "degraded" }.to_string(),
        store: if store_ok { "ok" } else { "shutting_down" }.to_string(),
        collections: stats.collection_count,
        documents: stats.document_count,
        users: state.auth.user_count().await,
        ws_connections: state.ws_hub.connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
