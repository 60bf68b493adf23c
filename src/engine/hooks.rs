//! Post-transition hooks.
//!
//! A hook is a bounded side effect registered for a `(step, resulting
//! status)` pair. The engine runs it after the transition has committed and
//! only logs its failure.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::collaborators::{
    CollaboratorSource, CreateOutcome, WorkItem, WorkItemSink, WorkKind,
};
use crate::types::UserId;
use crate::workflow::{EpisodeWorkflow, StepNumber, StepStatus, WorkflowError};

/// What a hook gets to see about the transition that triggered it
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub workflow: &'a EpisodeWorkflow,
    pub step: StepNumber,
    pub status: StepStatus,
    pub actor: Option<UserId>,
    pub now: DateTime<Utc>,
}

pub trait TransitionHook: Send + Sync {
    /// Hook name (for logging)
    fn name(&self) -> &str;

    fn run(&self, ctx: &HookContext<'_>) -> Result<(), WorkflowError>;
}

/// Registered hooks, at most one per `(step, status)`
#[derive(Clone, Default)]
pub struct HookTable {
    hooks: HashMap<(StepNumber, StepStatus), Arc<dyn TransitionHook>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard pipeline's hooks: approving creative work opens promotion work
    pub fn standard(source: Arc<dyn CollaboratorSource>, sink: Arc<dyn WorkItemSink>) -> Self {
        let mut table = Self::new();
        table.register(
            4,
            StepStatus::Completed,
            Arc::new(PromotionWorkHook::new(source, sink)),
        );
        table
    }

    /// Register `hook`, replacing any hook already at this key
    pub fn register(&mut self, step: StepNumber, status: StepStatus, hook: Arc<dyn TransitionHook>) {
        self.hooks.insert((step, status), hook);
    }

    pub fn get(&self, step: StepNumber, status: StepStatus) -> Option<&Arc<dyn TransitionHook>> {
        self.hooks.get(&(step, status))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Creates the episode's promotion work item from the creative work schedule
pub struct PromotionWorkHook {
    source: Arc<dyn CollaboratorSource>,
    sink: Arc<dyn WorkItemSink>,
}

impl PromotionWorkHook {
    pub fn new(source: Arc<dyn CollaboratorSource>, sink: Arc<dyn WorkItemSink>) -> Self {
        Self { source, sink }
    }
}

impl TransitionHook for PromotionWorkHook {
    fn name(&self) -> &str {
        "promotion_work"
    }

    fn run(&self, ctx: &HookContext<'_>) -> Result<(), WorkflowError> {
        let episode = ctx.workflow.episode_id;
        let creative = self
            .source
            .work_item(episode, WorkKind::Creative)
            .map_err(|e| WorkflowError::DependencyUnavailable(e.to_string()))?
            .ok_or_else(|| {
                WorkflowError::DependencyUnavailable(format!(
                    "episode {} has no creative work",
                    episode
                ))
            })?;
        let schedule = creative
            .schedule
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                WorkflowError::DependencyUnavailable(format!(
                    "creative work for episode {} has no shoot schedule",
                    episode
                ))
            })?;

        let mut item = WorkItem::new(episode, WorkKind::Promotion, "draft").with_schedule(schedule);
        item.updated_at = Some(ctx.now);

        let outcome = self
            .sink
            .create_dependent(item)
            .map_err(|e| WorkflowError::DependencyUnavailable(e.to_string()))?;
        match outcome {
            CreateOutcome::Created => info!(episode = %episode, "Created promotion work"),
            CreateOutcome::AlreadyExists => {
                info!(episode = %episode, "Promotion work already exists, nothing to create");
            }
        }
        Ok(())
    }
}
