//! Notification fan-out for workflow transitions.
//!
//! The engine hands each transition to the [`NotificationService`], which
//! resolves recipients from the crew directory and writes one record per
//! recipient to a [`NotificationSink`] in a single bulk call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

mod service;
mod sink;

pub use service::NotificationService;
pub use sink::{InMemoryNotificationSink, NotificationSink};

use crate::types::{EpisodeId, NotificationId, UserId};
use crate::workflow::StepNumber;

/// What happened to the step a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The step moved to in progress
    StepStarted,
    /// The previous step completed, this one can begin
    StepReady,
    /// A user was assigned to the step
    StepAssigned,
    /// The step was reset to pending
    StepReset,
}

impl NotificationKind {
    /// Dotted event name used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationKind::StepStarted => "step.started",
            NotificationKind::StepReady => "step.ready",
            NotificationKind::StepAssigned => "step.assigned",
            NotificationKind::StepReset => "step.reset",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::StepStarted => "Step started",
            NotificationKind::StepReady => "Step ready",
            NotificationKind::StepAssigned => "Step assigned",
            NotificationKind::StepReset => "Step reset",
        }
    }

    pub fn message(&self, step: StepNumber, step_name: &str) -> String {
        match self {
            NotificationKind::StepStarted => {
                format!("Step {} '{}' is now in progress", step, step_name)
            }
            NotificationKind::StepReady => {
                format!("Step {} '{}' is ready to start", step, step_name)
            }
            NotificationKind::StepAssigned => {
                format!("You have been assigned to step {} '{}'", step, step_name)
            }
            NotificationKind::StepReset => {
                format!("Step {} '{}' was reset to pending", step, step_name)
            }
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// One notification addressed to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub recipient: UserId,
    pub episode_id: EpisodeId,
    pub step_number: StepNumber,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        assert_eq!(NotificationKind::StepReady.event_type(), "step.ready");
        assert_eq!(NotificationKind::StepReset.to_string(), "step.reset");
    }

    #[test]
    fn test_message_names_step() {
        let msg = NotificationKind::StepAssigned.message(6, "QC by Distribution Manager");
        assert_eq!(
            msg,
            "You have been assigned to step 6 'QC by Distribution Manager'"
        );
    }

    #[test]
    fn test_record_serialization() {
        let record = NotificationRecord {
            id: NotificationId::new(),
            recipient: UserId::new(),
            episode_id: EpisodeId::new(),
            step_number: 2,
            kind: NotificationKind::StepStarted,
            title: "Step started".into(),
            message: "Step 2 'Production Planning' is now in progress".into(),
            created_at: Utc::now(),
            read: false,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "step_started");
        assert_eq!(json["step_number"], 2);
    }
}
