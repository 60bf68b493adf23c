//! Activity log endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::rest::dto::ActivityQuery;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::types::{EpisodeId, ProgramId};

/// Activity for one episode, newest first
#[utoipa::path(
    get,
    path = "/api/v1/episodes/{id}/activity",
    tag = "Activity",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ActivityQuery
    ),
    responses(
        (status = 200, description = "Activity entries", body = Vec<ActivityEntry>),
        (status = 404, description = "Episode has no workflow", body = ErrorResponse)
    )
)]
pub async fn for_episode(
    State(state): State<ApiState>,
    Path(id): Path<EpisodeId>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let entries = state
        .with_engine(move |engine| engine.activity(id, query.limit))
        .await?;
    Ok(Json(entries))
}

/// Activity across every episode of a program, newest first
#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}/activity",
    tag = "Activity",
    params(
        ("id" = Uuid, Path, description = "Program id"),
        ActivityQuery
    ),
    responses(
        (status = 200, description = "Activity entries", body = Vec<ActivityEntry>)
    )
)]
pub async fn for_program(
    State(state): State<ApiState>,
    Path(id): Path<ProgramId>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let entries = state
        .with_engine(move |engine| engine.program_activity(id, query.limit))
        .await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityAction;
    use crate::rest::state::test_state;

    #[tokio::test]
    async fn test_episode_activity_newest_first() {
        let state = test_state();
        let episode = EpisodeId::new();
        let program = ProgramId::new();
        state.engine.initialize_workflow(episode, program, None).unwrap();
        state.engine.start_step(episode, 2, None, None).unwrap();

        let Json(entries) = for_episode(
            State(state.clone()),
            Path(episode),
            Query(ActivityQuery { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, ActivityAction::StepStarted);

        let Json(limited) = for_program(
            State(state),
            Path(program),
            Query(ActivityQuery { limit: Some(1) }),
        )
        .await
        .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_episode_activity() {
        let err = for_episode(
            State(test_state()),
            Path(EpisodeId::new()),
            Query(ActivityQuery::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
