//! End-to-end engine behaviour over the in-memory stores.

use std::sync::Arc;
use std::thread;

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use showrunner::activity::ActivityAction;
use showrunner::clock::{Clock, ManualClock};
use showrunner::collaborators::{InMemoryWorkItems, WorkItem, WorkKind, WorkSchedule};
use showrunner::config::{NextStepPolicy, NotificationsConfig, WorkflowConfig};
use showrunner::crew::{CrewDirectory, RoleResolver};
use showrunner::engine::{HookTable, WorkflowEngine};
use showrunner::notifications::{InMemoryNotificationSink, NotificationKind, NotificationService};
use showrunner::store::InMemoryWorkflowStore;
use showrunner::types::{Actor, EpisodeId, ProgramId, Role, UserId};
use showrunner::workflow::{ErrorKind, StepStatus};

struct Harness {
    engine: Arc<WorkflowEngine>,
    items: Arc<InMemoryWorkItems>,
    notifications: Arc<InMemoryNotificationSink>,
    clock: ManualClock,
    program: ProgramId,
}

fn harness_with(crew: CrewDirectory, workflow: WorkflowConfig) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let crew = Arc::new(crew);
    let items = Arc::new(InMemoryWorkItems::new());
    let notifications = Arc::new(InMemoryNotificationSink::new());
    let notifier = NotificationService::new(
        &NotificationsConfig::default(),
        notifications.clone(),
        RoleResolver::new(crew.clone()),
        shared_clock.clone(),
    );
    let engine = WorkflowEngine::new(Arc::new(InMemoryWorkflowStore::new()), crew, items.clone())
        .with_clock(shared_clock)
        .with_hooks(HookTable::standard(items.clone(), items.clone()))
        .with_notifier(notifier)
        .with_workflow_config(&workflow);

    Harness {
        engine: Arc::new(engine),
        items,
        notifications,
        clock,
        program: ProgramId::new(),
    }
}

fn harness() -> Harness {
    harness_with(CrewDirectory::new(), WorkflowConfig::default())
}

fn creative_with_schedule(episode: EpisodeId) -> WorkItem {
    WorkItem::new(episode, WorkKind::Creative, "approved").with_schedule(WorkSchedule {
        shoot_date: NaiveDate::from_ymd_opt(2024, 3, 12),
        shoot_time: Some("10:00".to_string()),
        location: Some("Studio B".to_string()),
    })
}

#[test]
fn initialized_workflow_has_one_pending_record_per_step() {
    let h = harness();
    let episode = EpisodeId::new();
    let workflow = h.engine.initialize_workflow(episode, h.program, None).unwrap();

    let numbers: Vec<u32> = workflow.steps.iter().map(|r| r.step_number).collect();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    assert!(workflow.steps.iter().all(|r| r.status == StepStatus::Pending));
    assert_eq!(workflow.completion_percentage(), 0);

    let err = h.engine.initialize_workflow(episode, h.program, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[test]
fn approving_creative_work_creates_promotion_work_exactly_once() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.items.upsert(creative_with_schedule(episode)).unwrap();

    let record = h
        .engine
        .complete_step(episode, 4, Some("approved".into()), None)
        .unwrap();
    assert_eq!(record.status, StepStatus::Completed);
    assert!(record.completed_at.is_some());

    let promotion = h.items.get(episode, WorkKind::Promotion).unwrap();
    assert_eq!(promotion.status, "draft");
    assert_eq!(promotion.schedule.unwrap().location.as_deref(), Some("Studio B"));

    let err = h
        .engine
        .complete_step(episode, 4, Some("approved".into()), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    let promotions = h
        .items
        .for_episode(episode)
        .into_iter()
        .filter(|i| i.kind == WorkKind::Promotion)
        .count();
    assert_eq!(promotions, 1);
}

#[test]
fn concurrent_completions_create_one_promotion_item() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.items.upsert(creative_with_schedule(episode)).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = h.engine.clone();
            thread::spawn(move || engine.complete_step(episode, 4, None, None).is_ok())
        })
        .collect();
    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(h.items.for_episode(episode).len(), 2);
}

#[test]
fn completing_unstarted_step_backfills_start() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    let record = h.engine.complete_step(episode, 3, None, None).unwrap();
    assert_eq!(record.started_at, record.completed_at);
    assert_eq!(record.duration(), Some(Duration::zero()));
}

#[test]
fn duration_spans_start_to_completion() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    h.engine.start_step(episode, 2, None, None).unwrap();
    h.clock.advance(Duration::hours(3));
    h.engine.complete_step(episode, 2, None, None).unwrap();

    let history = h.engine.get_history(episode).unwrap();
    assert_eq!(history[1].duration_secs, Some(3 * 3600));
}

#[test]
fn collaborator_state_completes_edit_step_on_read() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    let submitted = Utc.with_ymd_and_hms(2024, 3, 2, 16, 30, 0).unwrap();
    let mut editor = WorkItem::new(episode, WorkKind::Editor, "pending_qc");
    editor.submitted_at = Some(submitted);
    h.items.upsert(editor).unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::Promotion, "completed"))
        .unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::EditorPromotion, "completed"))
        .unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::Design, "pending_qc"))
        .unwrap();

    let view = h.engine.get_visualization(episode).unwrap();
    let edit = &view.steps[4];
    assert_eq!(edit.status, StepStatus::Completed);
    assert_eq!(edit.completed_at, Some(submitted));
    assert!(edit.started_at.is_some());

    let activity = h.engine.activity(episode, None).unwrap();
    let correction = activity
        .iter()
        .find(|e| e.action == ActivityAction::SystemCorrected)
        .unwrap();
    assert_eq!(correction.step_number, Some(5));
    assert!(correction.is_system());
}

#[test]
fn reconciliation_reaches_a_fixed_point() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::FinalQc, "approved"))
        .unwrap();

    let first = h.engine.reconcile(episode).unwrap();
    assert_eq!(first.corrected, vec![7]);
    let entries_after_first = h.engine.activity(episode, None).unwrap().len();

    let second = h.engine.reconcile(episode).unwrap();
    assert!(second.is_noop());
    assert_eq!(
        h.engine.activity(episode, None).unwrap().len(),
        entries_after_first
    );
}

#[test]
fn malformed_collaborator_status_only_fails_its_step() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::Creative, "banana"))
        .unwrap();
    h.items
        .upsert(WorkItem::new(episode, WorkKind::DistributionQc, "completed"))
        .unwrap();

    let view = h.engine.get_visualization(episode).unwrap();
    assert_eq!(view.steps[0].status, StepStatus::Pending);
    assert_eq!(view.steps[5].status, StepStatus::Completed);
    assert_eq!(view.reconcile_failures.len(), 1);
    assert_eq!(view.reconcile_failures[0].step_number, 1);
}

#[test]
fn episodes_do_not_affect_each_other() {
    let h = harness();
    let first = EpisodeId::new();
    let second = EpisodeId::new();
    h.engine.initialize_workflow(first, h.program, None).unwrap();
    h.engine.initialize_workflow(second, h.program, None).unwrap();

    h.engine.complete_step(first, 1, None, None).unwrap();
    h.items
        .upsert(WorkItem::new(first, WorkKind::Production, "completed"))
        .unwrap();
    h.engine.reconcile(first).unwrap();

    let untouched = h.engine.get_visualization(second).unwrap();
    assert!(untouched.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(h.engine.activity(second, None).unwrap().len(), 1);
}

#[test]
fn assigned_user_resolution_is_deterministic() {
    let program = ProgramId::new();
    let manager = UserId::new();
    let editor = UserId::new();
    let promo = UserId::new();
    let mut crew = CrewDirectory::new();
    crew.set_manager(program, manager);
    crew.assign(program, Role::Editor, editor);
    crew.assign(program, Role::Promotion, promo);

    let mut h = harness_with(crew, WorkflowConfig::default());
    h.program = program;
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, program, None).unwrap();

    let first = h.engine.get_visualization(episode).unwrap();
    let second = h.engine.get_visualization(episode).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.steps[3].assigned_user, Some(manager));
    assert_eq!(first.steps[4].assigned_user, Some(editor));
    assert_eq!(first.steps[6].assigned_user, None);
}

#[test]
fn auto_start_policy_starts_next_step() {
    let h = harness_with(
        CrewDirectory::new(),
        WorkflowConfig {
            next_step_policy: NextStepPolicy::AutoStart,
            ..WorkflowConfig::default()
        },
    );
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    h.engine.complete_step(episode, 1, None, None).unwrap();
    let workflow = h.engine.get_episode(episode).unwrap();
    assert_eq!(workflow.step(2).unwrap().status, StepStatus::InProgress);
    assert_eq!(workflow.current_step().unwrap().step_number, 2);
}

#[test]
fn advisory_policy_notifies_next_step_crew() {
    let program = ProgramId::new();
    let qc = UserId::new();
    let mut crew = CrewDirectory::new();
    crew.assign(program, Role::QualityControl, qc);
    let mut h = harness_with(crew, WorkflowConfig::default());
    h.program = program;

    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, program, None).unwrap();
    h.engine.complete_step(episode, 6, None, None).unwrap();

    let workflow = h.engine.get_episode(episode).unwrap();
    assert_eq!(workflow.step(7).unwrap().status, StepStatus::Pending);

    let inbox = h.notifications.for_recipient(qc, false);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::StepReady);
}

#[test]
fn reset_requires_privileged_role_and_clears_step() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.engine
        .complete_step(episode, 2, Some("wrapped".into()), None)
        .unwrap();

    let editor = Actor::new(UserId::new(), Role::Editor);
    let err = h.engine.reset_step(episode, 2, &editor).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let manager = Actor::new(UserId::new(), Role::ProgramManager);
    let record = h.engine.reset_step(episode, 2, &manager).unwrap();
    assert_eq!(record.status, StepStatus::Pending);
    assert!(record.started_at.is_none());
    assert!(record.completed_at.is_none());
    assert!(record.notes.is_none());

    // A reset step can be worked again
    h.engine.start_step(episode, 2, None, None).unwrap();
}

#[test]
fn activity_is_newest_first_and_scoped_to_program() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.clock.advance(Duration::minutes(1));
    h.engine.start_step(episode, 1, None, None).unwrap();
    h.clock.advance(Duration::minutes(1));
    h.engine.complete_step(episode, 1, None, None).unwrap();

    let entries = h.engine.activity(episode, None).unwrap();
    let actions: Vec<ActivityAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            ActivityAction::StepCompleted,
            ActivityAction::StepStarted,
            ActivityAction::WorkflowInitialized,
        ]
    );

    assert_eq!(h.engine.program_activity(h.program, Some(2)).unwrap().len(), 2);
    assert!(h
        .engine
        .program_activity(ProgramId::new(), None)
        .unwrap()
        .is_empty());
}

#[test]
fn unknown_episode_and_step_are_not_found() {
    let h = harness();
    let err = h.engine.get_visualization(EpisodeId::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    let err = h.engine.start_step(episode, 9, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn correction_never_leaves_completion_before_start() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap());
    h.engine.start_step(episode, 7, None, None).unwrap();

    let approved = Utc.with_ymd_and_hms(2026, 1, 4, 9, 0, 0).unwrap();
    let mut final_qc = WorkItem::new(episode, WorkKind::FinalQc, "approved");
    final_qc.completed_at = Some(approved);
    h.items.upsert(final_qc).unwrap();

    let view = h.engine.get_visualization(episode).unwrap();
    let step = &view.steps[6];
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.completed_at, Some(approved));
    assert_eq!(step.started_at, Some(approved));
    assert_eq!(step.duration_secs, Some(0));

    let history = h.engine.get_history(episode).unwrap();
    assert!(history.iter().all(|row| row.duration_secs.unwrap_or(0) >= 0));
}

#[test]
fn failing_hook_still_commits_the_completion() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();

    // No creative work exists, so the promotion hook cannot run
    let record = h
        .engine
        .complete_step(episode, 4, Some("approved".into()), None)
        .unwrap();
    assert_eq!(record.status, StepStatus::Completed);

    let stored = h.engine.get_episode(episode).unwrap();
    assert!(stored.step(4).unwrap().is_completed());
    assert!(h.items.get(episode, WorkKind::Promotion).is_none());

    let latest = &h.engine.activity(episode, Some(1)).unwrap()[0];
    assert_eq!(latest.action, ActivityAction::StepCompleted);
    assert_eq!(latest.step_number, Some(4));
}

#[test]
fn recompleting_after_reset_keeps_one_promotion_item() {
    let h = harness();
    let episode = EpisodeId::new();
    h.engine.initialize_workflow(episode, h.program, None).unwrap();
    h.items.upsert(creative_with_schedule(episode)).unwrap();
    let admin = Actor::new(UserId::new(), Role::Admin);

    h.engine.complete_step(episode, 4, None, None).unwrap();
    h.engine.reset_step(episode, 4, &admin).unwrap();
    let record = h.engine.complete_step(episode, 4, None, None).unwrap();
    assert_eq!(record.status, StepStatus::Completed);

    let promotions = h
        .items
        .for_episode(episode)
        .into_iter()
        .filter(|i| i.kind == WorkKind::Promotion)
        .count();
    assert_eq!(promotions, 1);
}
