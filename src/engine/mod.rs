//! The workflow engine: transition operations over episode workflows.
//!
//! Every mutation runs inside [`WorkflowStore::transact`], so the state
//! change and its activity entry commit together. Hooks and notifications
//! run after the commit and never fail the operation.

mod hooks;
mod view;

pub use hooks::{HookContext, HookTable, PromotionWorkHook, TransitionHook};
pub use view::{HistoryEntry, StepView, WorkflowVisualization};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::activity::{ActivityAction, ActivityEntry, ChangeSet};
use crate::clock::{Clock, SystemClock};
use crate::collaborators::CollaboratorSource;
use crate::config::{NextStepPolicy, WorkflowConfig};
use crate::crew::{CrewSource, RoleResolver};
use crate::notifications::{NotificationKind, NotificationService};
use crate::reconcile::{apply_correction, ReconcileReport, Reconciler};
use crate::store::WorkflowStore;
use crate::types::{Actor, EpisodeId, ProgramId, Role, UserId};
use crate::workflow::{
    EpisodeWorkflow, ProgressRecord, StepDefinition, StepNumber, StepStatus, WorkflowError,
    WorkflowRegistry,
};

pub struct WorkflowEngine {
    registry: WorkflowRegistry,
    store: Arc<dyn WorkflowStore>,
    resolver: RoleResolver,
    reconciler: Reconciler,
    hooks: HookTable,
    notifier: NotificationService,
    clock: Arc<dyn Clock>,
    policy: NextStepPolicy,
    reset_roles: Vec<Role>,
}

fn record_mut(
    workflow: &mut EpisodeWorkflow,
    step: StepNumber,
) -> Result<&mut ProgressRecord, WorkflowError> {
    workflow
        .step_mut(step)
        .ok_or(WorkflowError::StepNotFound(step))
}

fn record_of(workflow: &EpisodeWorkflow, step: StepNumber) -> Result<ProgressRecord, WorkflowError> {
    workflow
        .step(step)
        .cloned()
        .ok_or(WorkflowError::StepNotFound(step))
}

/// Move a step to in progress. `None` when nothing changed.
fn mark_started(
    workflow: &mut EpisodeWorkflow,
    step: StepNumber,
    user: Option<UserId>,
    actor: Option<UserId>,
    now: DateTime<Utc>,
    automatic: bool,
) -> Result<Option<ActivityEntry>, WorkflowError> {
    let episode = workflow.episode_id;
    let record = record_mut(workflow, step)?;
    if record.is_completed() {
        return Err(WorkflowError::AlreadyCompleted { episode, step });
    }

    let before = record.clone();
    record.status = StepStatus::InProgress;
    if record.started_at.is_none() {
        record.started_at = Some(now);
    }
    if user.is_some() {
        record.assigned_user_id = user;
    }

    let changes = ChangeSet::new()
        .field("status", &before.status, &record.status)
        .field("started_at", &before.started_at, &record.started_at)
        .field(
            "assigned_user_id",
            &before.assigned_user_id,
            &record.assigned_user_id,
        );
    if changes.is_empty() {
        return Ok(None);
    }
    let description = if automatic {
        format!("Step {} '{}' started automatically", step, record.step_name)
    } else {
        format!("Step {} '{}' started", step, record.step_name)
    };

    Ok(Some(
        ActivityEntry::new(workflow, ActivityAction::StepStarted, description, changes, actor, now)
            .for_step(step),
    ))
}

impl WorkflowEngine {
    /// Engine over the standard registry with no hooks, no notifications and
    /// the system clock
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        crew: Arc<dyn CrewSource>,
        collaborators: Arc<dyn CollaboratorSource>,
    ) -> Self {
        let defaults = WorkflowConfig::default();
        Self {
            registry: WorkflowRegistry::standard(),
            store,
            resolver: RoleResolver::new(crew),
            reconciler: Reconciler::new(collaborators),
            hooks: HookTable::new(),
            notifier: NotificationService::disabled(),
            clock: Arc::new(SystemClock),
            policy: defaults.next_step_policy,
            reset_roles: defaults.reset_roles,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hooks(mut self, hooks: HookTable) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_notifier(mut self, notifier: NotificationService) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_workflow_config(mut self, config: &WorkflowConfig) -> Self {
        self.policy = config.next_step_policy;
        self.reset_roles = config.reset_roles.clone();
        self
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn policy(&self) -> NextStepPolicy {
        self.policy
    }

    /// The step catalog, in order
    pub fn steps(&self) -> &'static [StepDefinition] {
        self.registry.all_steps()
    }

    fn check_step(&self, step: StepNumber) -> Result<(), WorkflowError> {
        if self.registry.is_valid_step(step) {
            Ok(())
        } else {
            Err(WorkflowError::StepNotFound(step))
        }
    }

    fn run_hook(
        &self,
        workflow: &EpisodeWorkflow,
        step: StepNumber,
        status: StepStatus,
        actor: Option<UserId>,
    ) {
        let Some(hook) = self.hooks.get(step, status) else {
            return;
        };
        let ctx = HookContext {
            workflow,
            step,
            status,
            actor,
            now: self.clock.now(),
        };
        match hook.run(&ctx) {
            Ok(()) => debug!(hook = hook.name(), episode = %workflow.episode_id, step, "Hook ran"),
            Err(e) => warn!(
                hook = hook.name(),
                episode = %workflow.episode_id,
                step,
                error = %e,
                "Post-transition hook failed"
            ),
        }
    }

    /// Create the episode's progress records, all pending
    pub fn initialize_workflow(
        &self,
        episode: EpisodeId,
        program: ProgramId,
        actor: Option<UserId>,
    ) -> Result<EpisodeWorkflow, WorkflowError> {
        let now = self.clock.now();
        let workflow = EpisodeWorkflow::initialize(episode, program, &self.registry, now);
        let entry = ActivityEntry::new(
            &workflow,
            ActivityAction::WorkflowInitialized,
            format!("Workflow initialized with {} steps", workflow.steps.len()),
            ChangeSet::new().extra("steps", workflow.steps.len()),
            actor,
            now,
        );
        self.store.create(workflow.clone(), entry)?;
        info!(episode = %episode, program = %program, "Workflow initialized");
        Ok(workflow)
    }

    pub fn start_step(
        &self,
        episode: EpisodeId,
        step: StepNumber,
        user: Option<UserId>,
        actor: Option<UserId>,
    ) -> Result<ProgressRecord, WorkflowError> {
        self.check_step(step)?;
        let now = self.clock.now();
        let mut started = false;

        let workflow = self.store.transact(episode, &mut |wf| {
            let was_pending = wf.step(step).is_some_and(|r| r.status == StepStatus::Pending);
            let entry = mark_started(wf, step, user, actor, now, false)?;
            started = was_pending;
            Ok(entry.into_iter().collect())
        })?;

        if started {
            info!(episode = %episode, step, "Step started");
            self.run_hook(&workflow, step, StepStatus::InProgress, actor);
            self.notifier
                .notify_step(NotificationKind::StepStarted, &workflow, step, None);
        }
        record_of(&workflow, step)
    }

    pub fn complete_step(
        &self,
        episode: EpisodeId,
        step: StepNumber,
        notes: Option<String>,
        actor: Option<UserId>,
    ) -> Result<ProgressRecord, WorkflowError> {
        self.check_step(step)?;
        let now = self.clock.now();
        let next = self.registry.next_step(step);
        let auto_start = self.policy == NextStepPolicy::AutoStart;
        let mut auto_started = false;

        let workflow = self.store.transact(episode, &mut |wf| {
            auto_started = false;
            let record = record_mut(wf, step)?;
            if record.is_completed() {
                return Err(WorkflowError::AlreadyCompleted { episode, step });
            }

            let before = record.clone();
            record.status = StepStatus::Completed;
            record.completed_at = Some(now);
            if record.started_at.is_none() {
                record.started_at = Some(now);
            }
            if notes.is_some() {
                record.notes.clone_from(&notes);
            }
            let changes = ChangeSet::new()
                .field("status", &before.status, &record.status)
                .field("started_at", &before.started_at, &record.started_at)
                .field("completed_at", &before.completed_at, &record.completed_at)
                .field("notes", &before.notes, &record.notes);
            let description = format!("Step {} '{}' completed", step, record.step_name);

            let mut entries = vec![ActivityEntry::new(
                wf,
                ActivityAction::StepCompleted,
                description,
                changes,
                actor,
                now,
            )
            .for_step(step)];

            if let Some(next) = next.filter(|_| auto_start) {
                let next_pending = wf.step(next).is_some_and(|r| r.status == StepStatus::Pending);
                if next_pending {
                    entries.extend(mark_started(wf, next, None, None, now, true)?);
                    auto_started = true;
                }
            }
            Ok(entries)
        })?;

        info!(episode = %episode, step, "Step completed");
        self.run_hook(&workflow, step, StepStatus::Completed, actor);

        match next {
            Some(next) if auto_started => {
                info!(episode = %episode, step = next, "Next step started automatically");
                self.run_hook(&workflow, next, StepStatus::InProgress, None);
                self.notifier
                    .notify_step(NotificationKind::StepStarted, &workflow, next, None);
            }
            Some(next) => {
                if let Some(upcoming) = workflow.step(next).filter(|r| !r.is_completed()) {
                    info!(
                        episode = %episode,
                        step = next,
                        name = %upcoming.step_name,
                        "Next step is ready to start"
                    );
                    self.notifier
                        .notify_step(NotificationKind::StepReady, &workflow, next, None);
                }
            }
            None => {
                if workflow.is_complete() {
                    info!(episode = %episode, "All workflow steps completed");
                }
            }
        }

        record_of(&workflow, step)
    }

    pub fn assign_user(
        &self,
        episode: EpisodeId,
        step: StepNumber,
        user: UserId,
        actor: Option<UserId>,
    ) -> Result<ProgressRecord, WorkflowError> {
        self.check_step(step)?;
        if !self.resolver.source().user_exists(user) {
            return Err(WorkflowError::UserNotFound(user));
        }
        let now = self.clock.now();
        let mut changed = false;

        let workflow = self.store.transact(episode, &mut |wf| {
            let record = record_mut(wf, step)?;
            let before = record.assigned_user_id;
            record.assigned_user_id = Some(user);
            let changes = ChangeSet::new().field("assigned_user_id", &before, &record.assigned_user_id);
            changed = !changes.is_empty();
            if !changed {
                return Ok(vec![]);
            }
            let description = format!("User {} assigned to step {} '{}'", user, step, record.step_name);
            Ok(vec![ActivityEntry::new(
                wf,
                ActivityAction::UserAssigned,
                description,
                changes,
                actor,
                now,
            )
            .for_step(step)])
        })?;

        if changed {
            info!(episode = %episode, step, user = %user, "User assigned");
            self.notifier
                .notify_step(NotificationKind::StepAssigned, &workflow, step, Some(user));
        }
        record_of(&workflow, step)
    }

    /// Return a step to pending, clearing every transition field.
    /// Only roles listed in `workflow.reset_roles` may do this.
    pub fn reset_step(
        &self,
        episode: EpisodeId,
        step: StepNumber,
        actor: &Actor,
    ) -> Result<ProgressRecord, WorkflowError> {
        self.check_step(step)?;
        if !self.reset_roles.contains(&actor.role) {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                action: "reset",
                step,
            });
        }
        let now = self.clock.now();
        let mut changed = false;

        let workflow = self.store.transact(episode, &mut |wf| {
            let record = record_mut(wf, step)?;
            let before = record.clone();
            record.clear();
            changed = before != *record;
            if !changed {
                return Ok(vec![]);
            }
            let changes = ChangeSet::new()
                .field("status", &before.status, &record.status)
                .field("started_at", &before.started_at, &record.started_at)
                .field("completed_at", &before.completed_at, &record.completed_at)
                .field(
                    "assigned_user_id",
                    &before.assigned_user_id,
                    &record.assigned_user_id,
                )
                .field("notes", &before.notes, &record.notes);
            let description = format!("Step {} '{}' reset to pending", step, record.step_name);
            Ok(vec![ActivityEntry::new(
                wf,
                ActivityAction::StepReset,
                description,
                changes,
                Some(actor.user_id),
                now,
            )
            .for_step(step)])
        })?;

        if changed {
            info!(episode = %episode, step, by = %actor.user_id, "Step reset");
            self.run_hook(&workflow, step, StepStatus::Pending, Some(actor.user_id));
            self.notifier
                .notify_step(NotificationKind::StepReset, &workflow, step, None);
        }
        record_of(&workflow, step)
    }

    pub fn update_step_notes(
        &self,
        episode: EpisodeId,
        step: StepNumber,
        notes: Option<String>,
        actor: Option<UserId>,
    ) -> Result<ProgressRecord, WorkflowError> {
        self.check_step(step)?;
        let now = self.clock.now();

        let workflow = self.store.transact(episode, &mut |wf| {
            let record = record_mut(wf, step)?;
            let before = record.notes.clone();
            record.notes.clone_from(&notes);
            let changes = ChangeSet::new().field("notes", &before, &record.notes);
            if changes.is_empty() {
                return Ok(vec![]);
            }
            let description = format!("Notes updated on step {} '{}'", step, record.step_name);
            Ok(vec![ActivityEntry::new(
                wf,
                ActivityAction::NotesUpdated,
                description,
                changes,
                actor,
                now,
            )
            .for_step(step)])
        })?;

        record_of(&workflow, step)
    }

    pub fn can_user_access_step(&self, actor: &Actor, step: StepNumber) -> bool {
        self.registry.can_role_access_step(actor.role, step)
    }

    /// The raw aggregate, without reconciliation
    pub fn get_episode(&self, episode: EpisodeId) -> Result<EpisodeWorkflow, WorkflowError> {
        self.store
            .load(episode)?
            .ok_or(WorkflowError::EpisodeNotFound(episode))
    }

    pub fn episode_ids(&self) -> Result<Vec<EpisodeId>, WorkflowError> {
        self.store.episode_ids()
    }

    /// Force-complete every step whose completion the collaborators imply.
    ///
    /// Running it again without collaborator changes corrects nothing.
    #[instrument(skip(self), level = "debug")]
    pub fn reconcile(&self, episode: EpisodeId) -> Result<ReconcileReport, WorkflowError> {
        let workflow = self.get_episode(episode)?;
        let assessment = self.reconciler.assess(&workflow);
        let mut corrected = Vec::new();

        if !assessment.implied.is_empty() {
            let now = self.clock.now();
            self.store.transact(episode, &mut |wf| {
                corrected.clear();
                let mut entries = Vec::new();
                for implied in &assessment.implied {
                    if let Some(entry) = apply_correction(wf, implied, now) {
                        corrected.push(implied.step);
                        entries.push(entry);
                    }
                }
                Ok(entries)
            })?;
        }

        for step in &corrected {
            info!(episode = %episode, step, "Step completed from collaborator status");
        }
        Ok(ReconcileReport {
            episode_id: episode,
            corrected,
            failures: assessment.failures,
        })
    }

    /// Reconcile, then build the board from the freshly stored state
    pub fn get_visualization(
        &self,
        episode: EpisodeId,
    ) -> Result<WorkflowVisualization, WorkflowError> {
        let report = self.reconcile(episode)?;
        let workflow = self.get_episode(episode)?;
        Ok(view::visualization(&self.resolver, &workflow, report.failures))
    }

    pub fn get_history(&self, episode: EpisodeId) -> Result<Vec<HistoryEntry>, WorkflowError> {
        self.reconcile(episode)?;
        let workflow = self.get_episode(episode)?;
        Ok(view::history(&self.resolver, &workflow))
    }

    pub fn activity(
        &self,
        episode: EpisodeId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError> {
        self.get_episode(episode)?;
        self.store.activity_for_episode(episode, limit)
    }

    pub fn program_activity(
        &self,
        program: ProgramId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError> {
        self.store.activity_for_program(program, limit)
    }
}
