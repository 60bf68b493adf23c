//! Read models returned by the visualization and history operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crew::RoleResolver;
use crate::reconcile::ReconcileFailure;
use crate::types::{EpisodeId, ProgramId, Role, UserId};
use crate::workflow::{EpisodeWorkflow, ProgressRecord, StepNumber, StepStatus};

/// One step as shown on the episode board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StepView {
    pub step_number: StepNumber,
    pub step_name: String,
    pub responsible_roles: Vec<Role>,
    pub status: StepStatus,
    /// Resolved from the crew directory, falling back to the manual assignment
    pub assigned_user: Option<UserId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowVisualization {
    pub episode_id: EpisodeId,
    pub program_id: ProgramId,
    pub steps: Vec<StepView>,
    pub completion_percentage: u8,
    pub current_step: Option<StepNumber>,
    /// Steps whose collaborator state could not be read during this request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reconcile_failures: Vec<ReconcileFailure>,
}

/// One row of an episode's step history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub step_number: StepNumber,
    pub status: StepStatus,
    pub assigned_user: Option<UserId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub notes: Option<String>,
}

fn duration_secs(record: &ProgressRecord) -> Option<i64> {
    record.duration().map(|d| d.num_seconds())
}

pub(crate) fn step_view(
    resolver: &RoleResolver,
    workflow: &EpisodeWorkflow,
    record: &ProgressRecord,
) -> StepView {
    StepView {
        step_number: record.step_number,
        step_name: record.step_name.clone(),
        responsible_roles: record.responsible_roles.clone(),
        status: record.status,
        assigned_user: resolver.display_user(workflow.program_id, record),
        started_at: record.started_at,
        completed_at: record.completed_at,
        duration_secs: duration_secs(record),
        notes: record.notes.clone(),
    }
}

pub(crate) fn visualization(
    resolver: &RoleResolver,
    workflow: &EpisodeWorkflow,
    reconcile_failures: Vec<ReconcileFailure>,
) -> WorkflowVisualization {
    WorkflowVisualization {
        episode_id: workflow.episode_id,
        program_id: workflow.program_id,
        steps: workflow
            .steps
            .iter()
            .map(|record| step_view(resolver, workflow, record))
            .collect(),
        completion_percentage: workflow.completion_percentage(),
        current_step: workflow.current_step().map(|r| r.step_number),
        reconcile_failures,
    }
}

pub(crate) fn history(resolver: &RoleResolver, workflow: &EpisodeWorkflow) -> Vec<HistoryEntry> {
    let mut rows: Vec<HistoryEntry> = workflow
        .steps
        .iter()
        .map(|record| HistoryEntry {
            step_number: record.step_number,
            status: record.status,
            assigned_user: resolver.display_user(workflow.program_id, record),
            started_at: record.started_at,
            completed_at: record.completed_at,
            duration_secs: duration_secs(record),
            notes: record.notes.clone(),
        })
        .collect();
    rows.sort_by_key(|r| r.step_number);
    rows
}
