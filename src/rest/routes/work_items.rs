//! Collaborator status ingestion.
//!
//! Collaborator subsystems push the current status of their work items here;
//! the reconciler reads them on the next workflow read or sweep.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::collaborators::{WorkItem, WorkKind};
use crate::rest::dto::WorkItemUpdate;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::types::EpisodeId;

/// Record a collaborator's current status for an episode
#[utoipa::path(
    put,
    path = "/api/v1/episodes/{id}/work-items/{kind}",
    tag = "Work Items",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("kind" = String, Path, description = "Work kind, e.g. editor or final_qc")
    ),
    request_body = WorkItemUpdate,
    responses(
        (status = 200, description = "Work item stored", body = WorkItem),
        (status = 400, description = "Unknown kind or status", body = ErrorResponse)
    )
)]
pub async fn upsert(
    State(state): State<ApiState>,
    Path((id, kind)): Path<(EpisodeId, String)>,
    Json(update): Json<WorkItemUpdate>,
) -> Result<Json<WorkItem>, ApiError> {
    let kind: WorkKind = kind.parse()?;
    let item = update.into_item(id, kind);
    // Reject statuses the reconciler would not understand
    item.parsed_status()?;

    let stored = item.clone();
    let work_items = state.work_items.clone();
    tokio::task::spawn_blocking(move || work_items.upsert(stored)).await??;

    tracing::info!(episode = %id, kind = %kind, status = %item.status, "Work item updated");
    Ok(Json(item))
}

/// All work items recorded for an episode
#[utoipa::path(
    get,
    path = "/api/v1/episodes/{id}/work-items",
    tag = "Work Items",
    params(
        ("id" = Uuid, Path, description = "Episode id")
    ),
    responses(
        (status = 200, description = "Work items", body = Vec<WorkItem>)
    )
)]
pub async fn list(State(state): State<ApiState>, Path(id): Path<EpisodeId>) -> Json<Vec<WorkItem>> {
    Json(state.work_items.for_episode(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::state::test_state;
    use crate::types::ProgramId;
    use crate::workflow::StepStatus;

    fn update(status: &str) -> WorkItemUpdate {
        WorkItemUpdate {
            status: status.to_string(),
            submitted_at: None,
            completed_at: None,
            updated_at: None,
            schedule: None,
        }
    }

    #[tokio::test]
    async fn test_ingested_status_drives_reconciliation() {
        let state = test_state();
        let episode = EpisodeId::new();
        state
            .engine
            .initialize_workflow(episode, ProgramId::new(), None)
            .unwrap();

        upsert(
            State(state.clone()),
            Path((episode, "final_qc".to_string())),
            Json(update("approved")),
        )
        .await
        .unwrap();

        let view = state.engine.get_visualization(episode).unwrap();
        assert_eq!(view.steps[6].status, StepStatus::Completed);

        let Json(items) = list(State(state), Path(episode)).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_and_status_rejected() {
        let state = test_state();
        let episode = EpisodeId::new();

        let err = upsert(
            State(state.clone()),
            Path((episode, "catering".to_string())),
            Json(update("completed")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = upsert(
            State(state.clone()),
            Path((episode, "editor".to_string())),
            Json(update("mostly_done")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(state.work_items.for_episode(episode).is_empty());
    }
}
