use crate::api::{HealthResponse, iso_timestamp};
use crate::state::AppState;
use axum::{Json, extract::State};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_shares = match state.store.count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Health check could not count shares: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "ok".into(),
        timestamp: iso_timestamp(state.clock.now()),
        active_shares,
        storage: state.store.kind(),
    })
}
