//! Read and write interfaces onto the collaborator subsystems whose work
//! items imply workflow progress.
//!
//! Each collaborator owns its own status vocabulary and timestamps; the
//! engine only reads them (and, for post-transition hooks, creates dependent
//! items).

mod memory;

pub use memory::InMemoryWorkItems;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::EpisodeId;

/// The collaborator subsystem a work item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Creative,
    Production,
    Promotion,
    Editor,
    EditorPromotion,
    Design,
    DistributionQc,
    FinalQc,
}

impl WorkKind {
    pub fn all() -> &'static [WorkKind] {
        &[
            WorkKind::Creative,
            WorkKind::Production,
            WorkKind::Promotion,
            WorkKind::Editor,
            WorkKind::EditorPromotion,
            WorkKind::Design,
            WorkKind::DistributionQc,
            WorkKind::FinalQc,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            WorkKind::Creative => "creative",
            WorkKind::Production => "production",
            WorkKind::Promotion => "promotion",
            WorkKind::Editor => "editor",
            WorkKind::EditorPromotion => "editor_promotion",
            WorkKind::Design => "design",
            WorkKind::DistributionQc => "distribution_qc",
            WorkKind::FinalQc => "final_qc",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for WorkKind {
    type Err = CollaboratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        WorkKind::all()
            .iter()
            .copied()
            .find(|k| k.key() == normalized)
            .ok_or_else(|| CollaboratorError::UnknownKind(s.to_string()))
    }
}

/// Union of the status vocabularies the collaborators report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Draft,
    Pending,
    InProgress,
    Submitted,
    PendingQc,
    Revision,
    Rejected,
    Approved,
    Completed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Draft => "draft",
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Submitted => "submitted",
            WorkStatus::PendingQc => "pending_qc",
            WorkStatus::Revision => "revision",
            WorkStatus::Rejected => "rejected",
            WorkStatus::Approved => "approved",
            WorkStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(WorkStatus::Draft),
            "pending" => Some(WorkStatus::Pending),
            "in_progress" => Some(WorkStatus::InProgress),
            "submitted" => Some(WorkStatus::Submitted),
            "pending_qc" => Some(WorkStatus::PendingQc),
            "revision" => Some(WorkStatus::Revision),
            "rejected" => Some(WorkStatus::Rejected),
            "approved" => Some(WorkStatus::Approved),
            "completed" => Some(WorkStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shoot details carried on creative work and copied onto promotion work
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct WorkSchedule {
    pub shoot_date: Option<NaiveDate>,
    pub shoot_time: Option<String>,
    pub location: Option<String>,
}

impl WorkSchedule {
    pub fn is_empty(&self) -> bool {
        self.shoot_date.is_none() && self.shoot_time.is_none() && self.location.is_none()
    }
}

/// A collaborator's work item as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkItem {
    pub episode_id: EpisodeId,
    pub kind: WorkKind,
    /// Raw status as reported by the collaborator
    pub status: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schedule: Option<WorkSchedule>,
}

impl WorkItem {
    pub fn new(episode_id: EpisodeId, kind: WorkKind, status: impl Into<String>) -> Self {
        Self {
            episode_id,
            kind,
            status: status.into(),
            submitted_at: None,
            completed_at: None,
            updated_at: None,
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: WorkSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn parsed_status(&self) -> Result<WorkStatus, CollaboratorError> {
        WorkStatus::parse(&self.status).ok_or_else(|| CollaboratorError::Malformed {
            kind: self.kind,
            episode: self.episode_id,
            status: self.status.clone(),
        })
    }

    /// Best timestamp for when this item reached its current status
    pub fn authoritative_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.submitted_at).or(self.updated_at)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("unknown work kind '{0}'")]
    UnknownKind(String),

    #[error("{kind} work for episode {episode} has unrecognized status '{status}'")]
    Malformed {
        kind: WorkKind,
        episode: EpisodeId,
        status: String,
    },

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Status snapshots of collaborator work items
pub trait CollaboratorSource: Send + Sync {
    fn work_item(
        &self,
        episode: EpisodeId,
        kind: WorkKind,
    ) -> Result<Option<WorkItem>, CollaboratorError>;
}

/// Result of asking a sink to create a dependent item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Write side used by post-transition hooks.
///
/// Items are unique per `(episode, kind)`; creating one that exists is not
/// an error and leaves the existing item untouched.
pub trait WorkItemSink: Send + Sync {
    fn create_dependent(&self, item: WorkItem) -> Result<CreateOutcome, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_work_kind_parse() {
        assert_eq!("editor_promotion".parse::<WorkKind>().unwrap(), WorkKind::EditorPromotion);
        assert_eq!("final-qc".parse::<WorkKind>().unwrap(), WorkKind::FinalQc);
        assert!(matches!(
            "catering".parse::<WorkKind>(),
            Err(CollaboratorError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let item = WorkItem::new(EpisodeId::new(), WorkKind::Editor, "lost_in_transit");
        assert!(matches!(
            item.parsed_status(),
            Err(CollaboratorError::Malformed { kind: WorkKind::Editor, .. })
        ));
        let ok = WorkItem::new(EpisodeId::new(), WorkKind::Editor, "Pending_QC");
        assert_eq!(ok.parsed_status().unwrap(), WorkStatus::PendingQc);
    }

    #[test]
    fn test_authoritative_timestamp_preference() {
        let t = |h| Utc.with_ymd_and_hms(2026, 5, 1, h, 0, 0).unwrap();
        let mut item = WorkItem::new(EpisodeId::new(), WorkKind::Creative, "submitted");
        assert_eq!(item.authoritative_at(), None);
        item.updated_at = Some(t(9));
        assert_eq!(item.authoritative_at(), Some(t(9)));
        item.submitted_at = Some(t(8));
        assert_eq!(item.authoritative_at(), Some(t(8)));
        item.completed_at = Some(t(10));
        assert_eq!(item.authoritative_at(), Some(t(10)));
    }
}
