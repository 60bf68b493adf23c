//! Self-healing reconciliation.
//!
//! Steps whose completion is owned by collaborator subsystems (creative
//! submission, editing, QC) can be finished outside the engine. The
//! reconciler reads a fresh collaborator snapshot per step, decides with the
//! pure [`evaluate`] function whether the step is implied complete, and
//! produces the corrections the engine commits.

mod rules;

pub use rules::{
    evaluate, CollaboratorSnapshot, CompletionRule, Evidence, Requirement, RuleError, Verdict,
    STANDARD_RULES,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::activity::{ActivityAction, ActivityEntry, ChangeSet};
use crate::collaborators::CollaboratorSource;
use crate::types::EpisodeId;
use crate::workflow::{EpisodeWorkflow, StepNumber, StepStatus};

/// A step the reconciler could not evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconcileFailure {
    pub step_number: StepNumber,
    pub error: String,
}

/// Outcome of one reconciliation pass over an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconcileReport {
    pub episode_id: EpisodeId,
    /// Steps force-completed by this pass
    pub corrected: Vec<StepNumber>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.corrected.is_empty()
    }
}

/// A step the collaborators say is done but the workflow does not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpliedCompletion {
    pub step: StepNumber,
    pub at: Option<DateTime<Utc>>,
    pub evidence: Vec<Evidence>,
}

/// Result of evaluating every rule for one episode
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    pub implied: Vec<ImpliedCompletion>,
    pub failures: Vec<ReconcileFailure>,
}

pub struct Reconciler {
    rules: &'static [CompletionRule],
    source: Arc<dyn CollaboratorSource>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn CollaboratorSource>) -> Self {
        Self::with_rules(STANDARD_RULES, source)
    }

    pub fn with_rules(rules: &'static [CompletionRule], source: Arc<dyn CollaboratorSource>) -> Self {
        Self { rules, source }
    }

    pub fn rules(&self) -> &'static [CompletionRule] {
        self.rules
    }

    /// Evaluate every rule whose step is not yet completed.
    ///
    /// Each rule gets its own snapshot; a failure on one step is recorded and
    /// evaluation moves on to the next.
    pub fn assess(&self, workflow: &EpisodeWorkflow) -> Assessment {
        let mut assessment = Assessment::default();

        for rule in self.rules {
            let Some(record) = workflow.step(rule.step) else {
                continue;
            };
            if record.is_completed() {
                continue;
            }

            let verdict = CollaboratorSnapshot::fetch(self.source.as_ref(), workflow.episode_id, rule)
                .and_then(|snapshot| evaluate(rule, &snapshot));

            match verdict {
                Ok(Verdict::Complete { at, evidence }) => {
                    assessment.implied.push(ImpliedCompletion {
                        step: rule.step,
                        at,
                        evidence,
                    });
                }
                Ok(Verdict::Incomplete) => {}
                Err(e) => {
                    warn!(
                        episode = %workflow.episode_id,
                        step = rule.step,
                        error = %e,
                        "Could not evaluate completion rule"
                    );
                    assessment.failures.push(ReconcileFailure {
                        step_number: rule.step,
                        error: e.to_string(),
                    });
                }
            }
        }

        assessment
    }
}

/// Force-complete a step from collaborator evidence.
///
/// Returns `None` when the step is already completed (another writer got
/// there first), which keeps reconciliation a fixed point.
pub(crate) fn apply_correction(
    workflow: &mut EpisodeWorkflow,
    implied: &ImpliedCompletion,
    now: DateTime<Utc>,
) -> Option<ActivityEntry> {
    let record = workflow.step_mut(implied.step)?;
    if record.is_completed() {
        return None;
    }

    let completed_at = implied.at.unwrap_or(now);
    let before = record.clone();
    record.status = StepStatus::Completed;
    record.completed_at = Some(completed_at);
    // A step started after the collaborator finished starts at completion
    match record.started_at {
        Some(started) if started <= completed_at => {}
        _ => record.started_at = Some(completed_at),
    }

    let changes = ChangeSet::new()
        .field("status", &before.status, &record.status)
        .field("started_at", &before.started_at, &record.started_at)
        .field("completed_at", &before.completed_at, &record.completed_at)
        .extra("evidence", &implied.evidence);
    let description = format!(
        "Step {} '{}' marked completed by the system from collaborator status",
        record.step_number, record.step_name
    );
    let step = record.step_number;

    Some(
        ActivityEntry::new(
            workflow,
            ActivityAction::SystemCorrected,
            description,
            changes,
            None,
            now,
        )
        .for_step(step),
    )
}
