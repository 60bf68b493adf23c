//! Episode workflow endpoints: initialization, the board, and transitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::engine::{HistoryEntry, WorkflowVisualization};
use crate::reconcile::ReconcileReport;
use crate::rest::dto::{
    AssignUserRequest, CompleteStepRequest, InitializeRequest, ResetStepRequest,
    StartStepRequest, UpdateNotesRequest,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::types::{Actor, EpisodeId};
use crate::workflow::{EpisodeWorkflow, ProgressRecord, StepNumber};

/// Reject callers whose role does not own the step
fn ensure_access(state: &ApiState, actor: &Actor, step: StepNumber) -> Result<(), ApiError> {
    if !state.engine.registry().is_valid_step(step) {
        return Err(ApiError::NotFound(format!("step {} does not exist", step)));
    }
    if state.engine.can_user_access_step(actor, step) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "{} may not work on step {}",
            actor.role, step
        )))
    }
}

/// Initialize an episode's workflow
#[utoipa::path(
    post,
    path = "/api/v1/episodes/{id}/workflow",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id")
    ),
    request_body = InitializeRequest,
    responses(
        (status = 201, description = "Workflow created", body = EpisodeWorkflow),
        (status = 409, description = "Workflow already initialized", body = ErrorResponse)
    )
)]
pub async fn initialize(
    State(state): State<ApiState>,
    Path(id): Path<EpisodeId>,
    Json(request): Json<InitializeRequest>,
) -> Result<(StatusCode, Json<EpisodeWorkflow>), ApiError> {
    let workflow = state
        .with_engine(move |engine| {
            engine.initialize_workflow(id, request.program_id, request.actor)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// Reconciled workflow board for an episode
#[utoipa::path(
    get,
    path = "/api/v1/episodes/{id}/workflow",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id")
    ),
    responses(
        (status = 200, description = "Workflow visualization", body = WorkflowVisualization),
        (status = 404, description = "Episode has no workflow", body = ErrorResponse)
    )
)]
pub async fn visualization(
    State(state): State<ApiState>,
    Path(id): Path<EpisodeId>,
) -> Result<Json<WorkflowVisualization>, ApiError> {
    let view = state
        .with_engine(move |engine| engine.get_visualization(id))
        .await?;
    Ok(Json(view))
}

/// Per-step history for an episode
#[utoipa::path(
    get,
    path = "/api/v1/episodes/{id}/workflow/history",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id")
    ),
    responses(
        (status = 200, description = "Step history ordered by step number", body = Vec<HistoryEntry>),
        (status = 404, description = "Episode has no workflow", body = ErrorResponse)
    )
)]
pub async fn history(
    State(state): State<ApiState>,
    Path(id): Path<EpisodeId>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let rows = state
        .with_engine(move |engine| engine.get_history(id))
        .await?;
    Ok(Json(rows))
}

/// Run reconciliation for an episode now
#[utoipa::path(
    post,
    path = "/api/v1/episodes/{id}/workflow/reconcile",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id")
    ),
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 404, description = "Episode has no workflow", body = ErrorResponse)
    )
)]
pub async fn reconcile(
    State(state): State<ApiState>,
    Path(id): Path<EpisodeId>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state
        .with_engine(move |engine| engine.reconcile(id))
        .await?;
    Ok(Json(report))
}

/// Start a step
#[utoipa::path(
    post,
    path = "/api/v1/episodes/{id}/workflow/steps/{step}/start",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("step" = u32, Path, description = "Step number")
    ),
    request_body = StartStepRequest,
    responses(
        (status = 200, description = "Step started", body = ProgressRecord),
        (status = 403, description = "Role does not own this step", body = ErrorResponse),
        (status = 404, description = "Episode or step not found", body = ErrorResponse),
        (status = 409, description = "Step already completed", body = ErrorResponse)
    )
)]
pub async fn start(
    State(state): State<ApiState>,
    Path((id, step)): Path<(EpisodeId, StepNumber)>,
    Json(request): Json<StartStepRequest>,
) -> Result<Json<ProgressRecord>, ApiError> {
    ensure_access(&state, &request.actor, step)?;
    let actor = request.actor.user_id;
    let record = state
        .with_engine(move |engine| engine.start_step(id, step, request.user_id, Some(actor)))
        .await?;
    Ok(Json(record))
}

/// Complete a step
#[utoipa::path(
    post,
    path = "/api/v1/episodes/{id}/workflow/steps/{step}/complete",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("step" = u32, Path, description = "Step number")
    ),
    request_body = CompleteStepRequest,
    responses(
        (status = 200, description = "Step completed", body = ProgressRecord),
        (status = 403, description = "Role does not own this step", body = ErrorResponse),
        (status = 404, description = "Episode or step not found", body = ErrorResponse),
        (status = 409, description = "Step already completed", body = ErrorResponse)
    )
)]
pub async fn complete(
    State(state): State<ApiState>,
    Path((id, step)): Path<(EpisodeId, StepNumber)>,
    Json(request): Json<CompleteStepRequest>,
) -> Result<Json<ProgressRecord>, ApiError> {
    ensure_access(&state, &request.actor, step)?;
    let actor = request.actor.user_id;
    let record = state
        .with_engine(move |engine| engine.complete_step(id, step, request.notes, Some(actor)))
        .await?;
    Ok(Json(record))
}

/// Assign a user to a step
#[utoipa::path(
    put,
    path = "/api/v1/episodes/{id}/workflow/steps/{step}/assignee",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("step" = u32, Path, description = "Step number")
    ),
    request_body = AssignUserRequest,
    responses(
        (status = 200, description = "User assigned", body = ProgressRecord),
        (status = 403, description = "Role does not own this step", body = ErrorResponse),
        (status = 404, description = "Episode, step or user not found", body = ErrorResponse)
    )
)]
pub async fn assign(
    State(state): State<ApiState>,
    Path((id, step)): Path<(EpisodeId, StepNumber)>,
    Json(request): Json<AssignUserRequest>,
) -> Result<Json<ProgressRecord>, ApiError> {
    ensure_access(&state, &request.actor, step)?;
    let actor = request.actor.user_id;
    let record = state
        .with_engine(move |engine| engine.assign_user(id, step, request.user_id, Some(actor)))
        .await?;
    Ok(Json(record))
}

/// Reset a step to pending
#[utoipa::path(
    post,
    path = "/api/v1/episodes/{id}/workflow/steps/{step}/reset",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("step" = u32, Path, description = "Step number")
    ),
    request_body = ResetStepRequest,
    responses(
        (status = 200, description = "Step reset", body = ProgressRecord),
        (status = 403, description = "Role may not reset steps", body = ErrorResponse),
        (status = 404, description = "Episode or step not found", body = ErrorResponse)
    )
)]
pub async fn reset(
    State(state): State<ApiState>,
    Path((id, step)): Path<(EpisodeId, StepNumber)>,
    Json(request): Json<ResetStepRequest>,
) -> Result<Json<ProgressRecord>, ApiError> {
    let record = state
        .with_engine(move |engine| engine.reset_step(id, step, &request.actor))
        .await?;
    Ok(Json(record))
}

/// Replace a step's notes
#[utoipa::path(
    put,
    path = "/api/v1/episodes/{id}/workflow/steps/{step}/notes",
    tag = "Workflow",
    params(
        ("id" = Uuid, Path, description = "Episode id"),
        ("step" = u32, Path, description = "Step number")
    ),
    request_body = UpdateNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = ProgressRecord),
        (status = 403, description = "Role does not own this step", body = ErrorResponse),
        (status = 404, description = "Episode or step not found", body = ErrorResponse)
    )
)]
pub async fn notes(
    State(state): State<ApiState>,
    Path((id, step)): Path<(EpisodeId, StepNumber)>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<ProgressRecord>, ApiError> {
    ensure_access(&state, &request.actor, step)?;
    let actor = request.actor.user_id;
    let record = state
        .with_engine(move |engine| engine.update_step_notes(id, step, request.notes, Some(actor)))
        .await?;
    Ok(Json(record))
}
