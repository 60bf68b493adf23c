//! Append-only audit trail of workflow mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{EpisodeId, ProgramId, UserId};
use crate::workflow::{EpisodeWorkflow, StepNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    WorkflowInitialized,
    StepStarted,
    StepCompleted,
    UserAssigned,
    StepReset,
    NotesUpdated,
    SystemCorrected,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityAction::WorkflowInitialized => "workflow_initialized",
            ActivityAction::StepStarted => "step_started",
            ActivityAction::StepCompleted => "step_completed",
            ActivityAction::UserAssigned => "user_assigned",
            ActivityAction::StepReset => "step_reset",
            ActivityAction::NotesUpdated => "notes_updated",
            ActivityAction::SystemCorrected => "system_corrected",
        };
        f.write_str(s)
    }
}

/// One immutable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub episode_id: EpisodeId,
    pub program_id: ProgramId,
    pub step_number: Option<StepNumber>,
    pub action: ActivityAction,
    pub description: String,
    /// `{field: {from, to}}`
    #[schema(value_type = Object)]
    pub changes: Value,
    /// `None` for system-generated entries
    pub actor: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        workflow: &EpisodeWorkflow,
        action: ActivityAction,
        description: impl Into<String>,
        changes: ChangeSet,
        actor: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            episode_id: workflow.episode_id,
            program_id: workflow.program_id,
            step_number: None,
            action,
            description: description.into(),
            changes: changes.into_value(),
            actor,
            created_at,
        }
    }

    pub fn for_step(mut self, step: StepNumber) -> Self {
        self.step_number = Some(step);
        self
    }

    pub fn is_system(&self) -> bool {
        self.actor.is_none()
    }
}

/// Builder for the structured diff stored on an entry
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    fields: Map<String, Value>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field` moving from `from` to `to`; unchanged fields are skipped
    pub fn field<T: Serialize + PartialEq>(mut self, name: &str, from: &T, to: &T) -> Self {
        if from != to {
            self.fields
                .insert(name.to_string(), json!({ "from": from, "to": to }));
        }
        self
    }

    /// Attach a value that is context rather than a diff
    pub fn extra(mut self, name: &str, value: impl Serialize) -> Self {
        self.fields
            .insert(name.to_string(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Newest first, then truncated to `limit`
pub(crate) fn newest_first<'a>(
    entries: impl Iterator<Item = &'a ActivityEntry>,
    limit: Option<usize>,
) -> Vec<ActivityEntry> {
    let mut out: Vec<ActivityEntry> = entries.cloned().collect();
    // stable sort keeps insertion order for equal timestamps, so reverse first
    out.reverse();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}
