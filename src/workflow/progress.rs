use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::{StepDefinition, StepNumber, WorkflowRegistry};
use crate::types::{EpisodeId, ProgramId, Role, UserId};

/// Status of one step for one episode.
///
/// Moves forward only (`pending -> in_progress -> completed`); the reset
/// operation is the single way back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            other => Err(format!("unknown step status '{}'", other)),
        }
    }
}

/// Persisted state of one step for one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    pub episode_id: EpisodeId,
    pub step_number: StepNumber,
    /// Copied from the registry at initialization
    pub step_name: String,
    pub responsible_roles: Vec<Role>,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_user_id: Option<UserId>,
    pub notes: Option<String>,
}

impl ProgressRecord {
    pub fn pending(episode_id: EpisodeId, definition: &StepDefinition) -> Self {
        Self {
            episode_id,
            step_number: definition.step_number,
            step_name: definition.name.to_string(),
            responsible_roles: definition.responsible_roles.to_vec(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            assigned_user_id: None,
            notes: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    /// Time from start to completion, once both are known
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Back to `pending` with every transition field cleared
    pub fn clear(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.assigned_user_id = None;
        self.notes = None;
    }
}

/// The episode aggregate: every progress record for one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EpisodeWorkflow {
    pub episode_id: EpisodeId,
    pub program_id: ProgramId,
    pub created_at: DateTime<Utc>,
    /// Ordered by step number, one record per registry step
    pub steps: Vec<ProgressRecord>,
}

impl EpisodeWorkflow {
    /// Fresh workflow with every registry step pending
    pub fn initialize(
        episode_id: EpisodeId,
        program_id: ProgramId,
        registry: &WorkflowRegistry,
        now: DateTime<Utc>,
    ) -> Self {
        let steps = registry
            .all_steps()
            .iter()
            .map(|def| ProgressRecord::pending(episode_id, def))
            .collect();
        Self {
            episode_id,
            program_id,
            created_at: now,
            steps,
        }
    }

    pub fn step(&self, step: StepNumber) -> Option<&ProgressRecord> {
        self.steps.iter().find(|r| r.step_number == step)
    }

    pub fn step_mut(&mut self, step: StepNumber) -> Option<&mut ProgressRecord> {
        self.steps.iter_mut().find(|r| r.step_number == step)
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|r| r.is_completed()).count()
    }

    /// Share of completed steps, rounded to a whole percent
    pub fn completion_percentage(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let ratio = self.completed_count() as f64 / self.steps.len() as f64;
        (ratio * 100.0).round() as u8
    }

    /// First step (by number) that is not completed; `None` once everything is done
    pub fn current_step(&self) -> Option<&ProgressRecord> {
        self.steps
            .iter()
            .filter(|r| !r.is_completed())
            .min_by_key(|r| r.step_number)
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(ProgressRecord::is_completed)
    }
}
