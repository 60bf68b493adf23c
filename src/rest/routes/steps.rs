//! Step catalog endpoint.

use axum::{extract::State, Json};

use crate::rest::dto::StepDefinitionResponse;
use crate::rest::state::ApiState;

/// List the workflow steps in order
#[utoipa::path(
    get,
    path = "/api/v1/steps",
    tag = "Steps",
    responses(
        (status = 200, description = "Ordered step catalog", body = Vec<StepDefinitionResponse>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Json<Vec<StepDefinitionResponse>> {
    Json(
        state
            .engine
            .steps()
            .iter()
            .map(StepDefinitionResponse::from)
            .collect(),
    )
}
