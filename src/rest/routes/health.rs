//! Health check and status endpoints.

use axum::{extract::State, Json};

use crate::rest::dto::{HealthResponse, StatusResponse};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get service status with workflow counts
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = StatusResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, ApiError> {
    let episode_count = state.with_engine(|engine| engine.episode_ids()).await?.len();

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        step_count: state.engine.registry().len(),
        episode_count,
        next_step_policy: state.engine.policy(),
        reconcile_interval_secs: state.config.reconcile.interval_secs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::state::test_state;
    use crate::types::{EpisodeId, ProgramId};

    #[tokio::test]
    async fn test_health() {
        let resp = health().await;
        assert_eq!(resp.status, "ok");
        assert!(!resp.version.is_empty());
    }

    #[tokio::test]
    async fn test_status_counts_episodes() {
        let state = test_state();
        state
            .engine
            .initialize_workflow(EpisodeId::new(), ProgramId::new(), None)
            .unwrap();

        let resp = status(State(state)).await.unwrap();
        assert_eq!(resp.step_count, 8);
        assert_eq!(resp.episode_count, 1);
    }
}
