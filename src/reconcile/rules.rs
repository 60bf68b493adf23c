//! Completion rules: which collaborator states imply a step is done.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::collaborators::{CollaboratorError, CollaboratorSource, WorkItem, WorkKind, WorkStatus};
use crate::types::EpisodeId;
use crate::workflow::StepNumber;

/// One collaborator that must be in an accepted status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub kind: WorkKind,
    pub accepted: &'static [WorkStatus],
}

/// A step is implied complete when every requirement holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRule {
    pub step: StepNumber,
    pub requirements: &'static [Requirement],
}

impl CompletionRule {
    pub fn kinds(&self) -> impl Iterator<Item = WorkKind> + '_ {
        self.requirements.iter().map(|r| r.kind)
    }
}

const SUBMITTED: &[WorkStatus] = &[WorkStatus::Submitted, WorkStatus::Approved];
const DONE: &[WorkStatus] = &[WorkStatus::Completed];
const READY_FOR_QC: &[WorkStatus] = &[WorkStatus::PendingQc, WorkStatus::Completed];
const PASSED: &[WorkStatus] = &[WorkStatus::Completed, WorkStatus::Approved];

/// Rules for the standard pipeline
pub const STANDARD_RULES: &[CompletionRule] = &[
    CompletionRule {
        step: 1,
        requirements: &[Requirement {
            kind: WorkKind::Creative,
            accepted: SUBMITTED,
        }],
    },
    CompletionRule {
        step: 2,
        requirements: &[Requirement {
            kind: WorkKind::Production,
            accepted: DONE,
        }],
    },
    CompletionRule {
        step: 5,
        requirements: &[
            Requirement {
                kind: WorkKind::Editor,
                accepted: READY_FOR_QC,
            },
            Requirement {
                kind: WorkKind::Promotion,
                accepted: DONE,
            },
            Requirement {
                kind: WorkKind::EditorPromotion,
                accepted: READY_FOR_QC,
            },
            Requirement {
                kind: WorkKind::Design,
                accepted: READY_FOR_QC,
            },
        ],
    },
    CompletionRule {
        step: 6,
        requirements: &[Requirement {
            kind: WorkKind::DistributionQc,
            accepted: PASSED,
        }],
    },
    CompletionRule {
        step: 7,
        requirements: &[Requirement {
            kind: WorkKind::FinalQc,
            accepted: PASSED,
        }],
    },
];

/// Collaborator items fetched for one rule
#[derive(Debug, Clone, Default)]
pub struct CollaboratorSnapshot {
    items: BTreeMap<WorkKind, WorkItem>,
}

impl CollaboratorSnapshot {
    /// Read every item the rule depends on
    pub fn fetch(
        source: &dyn CollaboratorSource,
        episode: EpisodeId,
        rule: &CompletionRule,
    ) -> Result<Self, RuleError> {
        let mut items = BTreeMap::new();
        for kind in rule.kinds() {
            if let Some(item) = source.work_item(episode, kind)? {
                items.insert(kind, item);
            }
        }
        Ok(Self { items })
    }

    pub fn from_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.kind, item)).collect(),
        }
    }

    pub fn get(&self, kind: WorkKind) -> Option<&WorkItem> {
        self.items.get(&kind)
    }
}

/// Status of one collaborator that backed a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub kind: WorkKind,
    pub status: WorkStatus,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every requirement holds; `at` is the latest authoritative timestamp
    /// among the required items, if any of them carried one
    Complete {
        at: Option<DateTime<Utc>>,
        evidence: Vec<Evidence>,
    },
    /// At least one requirement does not hold (or its item does not exist yet)
    Incomplete,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Decide whether `rule` holds over `snapshot`.
///
/// A missing item makes the rule incomplete. An item whose status cannot be
/// parsed is an error, even if another requirement already failed, so bad
/// collaborator data is always surfaced.
pub fn evaluate(rule: &CompletionRule, snapshot: &CollaboratorSnapshot) -> Result<Verdict, RuleError> {
    let mut evidence = Vec::with_capacity(rule.requirements.len());
    let mut satisfied = true;

    for requirement in rule.requirements {
        let Some(item) = snapshot.get(requirement.kind) else {
            satisfied = false;
            continue;
        };
        let status = item.parsed_status()?;
        if !requirement.accepted.contains(&status) {
            satisfied = false;
            continue;
        }
        evidence.push(Evidence {
            kind: requirement.kind,
            status,
            at: item.authoritative_at(),
        });
    }

    if !satisfied {
        return Ok(Verdict::Incomplete);
    }
    let at = evidence.iter().filter_map(|e| e.at).max();
    Ok(Verdict::Complete { at, evidence })
}
