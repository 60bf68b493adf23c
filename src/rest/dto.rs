//! Request and response bodies for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::collaborators::{WorkItem, WorkKind, WorkSchedule};
use crate::config::NextStepPolicy;
use crate::types::{Actor, EpisodeId, ProgramId, Role, UserId};
use crate::workflow::{StepDefinition, StepNumber};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub step_count: usize,
    pub episode_count: usize,
    pub next_step_policy: NextStepPolicy,
    /// 0 when only read-triggered reconciliation runs
    pub reconcile_interval_secs: u64,
}

/// A step of the catalog
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepDefinitionResponse {
    pub step_number: StepNumber,
    pub name: String,
    pub responsible_roles: Vec<Role>,
}

impl From<&StepDefinition> for StepDefinitionResponse {
    fn from(def: &StepDefinition) -> Self {
        Self {
            step_number: def.step_number,
            name: def.name.to_string(),
            responsible_roles: def.responsible_roles.to_vec(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InitializeRequest {
    pub program_id: ProgramId,
    #[serde(default)]
    pub actor: Option<UserId>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartStepRequest {
    pub actor: Actor,
    /// User to assign while starting
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteStepRequest {
    pub actor: Actor,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignUserRequest {
    pub actor: Actor,
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetStepRequest {
    pub actor: Actor,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateNotesRequest {
    pub actor: Actor,
    /// `null` clears the notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Status pushed by a collaborator subsystem
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkItemUpdate {
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schedule: Option<WorkSchedule>,
}

impl WorkItemUpdate {
    pub fn into_item(self, episode: EpisodeId, kind: WorkKind) -> WorkItem {
        WorkItem {
            episode_id: episode,
            kind,
            status: self.status,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
            schedule: self.schedule,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Maximum number of entries, newest first
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}
