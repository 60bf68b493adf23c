//! Central notification service that fans transitions out to recipients.

use std::collections::HashSet;
use std::sync::Arc;

use super::{NotificationKind, NotificationRecord, NotificationSink};
use crate::clock::Clock;
use crate::config::NotificationsConfig;
use crate::crew::RoleResolver;
use crate::types::{NotificationId, UserId};
use crate::workflow::{EpisodeWorkflow, StepNumber};

/// Central notification dispatcher.
///
/// Resolves who should hear about a transition and writes the records in one
/// bulk call. Failures are logged and swallowed; the transition that
/// triggered the notification has already committed.
pub struct NotificationService {
    sink: Option<Arc<dyn NotificationSink>>,
    resolver: Option<RoleResolver>,
    clock: Option<Arc<dyn Clock>>,
    settings: NotificationsConfig,
}

impl NotificationService {
    pub fn new(
        settings: &NotificationsConfig,
        sink: Arc<dyn NotificationSink>,
        resolver: RoleResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sink: Some(sink),
            resolver: Some(resolver),
            clock: Some(clock),
            settings: settings.clone(),
        }
    }

    /// Create a disabled notification service (for testing).
    pub fn disabled() -> Self {
        Self {
            sink: None,
            resolver: None,
            clock: None,
            settings: NotificationsConfig {
                enabled: false,
                ..NotificationsConfig::default()
            },
        }
    }

    /// Check if notifications are globally enabled.
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled && self.sink.is_some()
    }

    /// Whether this kind of transition is configured to notify
    pub fn handles(&self, kind: NotificationKind) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match kind {
            NotificationKind::StepStarted => self.settings.on_step_started,
            NotificationKind::StepReady => self.settings.on_step_ready,
            NotificationKind::StepAssigned => self.settings.on_step_assigned,
            NotificationKind::StepReset => self.settings.on_step_reset,
        }
    }

    /// Notify everyone responsible for `step`, or only `direct` when given.
    ///
    /// Returns the number of records written; zero recipients writes nothing.
    pub fn notify_step(
        &self,
        kind: NotificationKind,
        workflow: &EpisodeWorkflow,
        step: StepNumber,
        direct: Option<UserId>,
    ) -> usize {
        if !self.handles(kind) {
            return 0;
        }
        let (Some(sink), Some(resolver), Some(clock)) = (&self.sink, &self.resolver, &self.clock)
        else {
            return 0;
        };
        let Some(record) = workflow.step(step) else {
            return 0;
        };

        let candidates = match direct {
            Some(user) => vec![user],
            None => resolver.resolve_step(workflow.program_id, record),
        };
        let recipients = dedup(candidates);
        if recipients.is_empty() {
            tracing::debug!(
                episode = %workflow.episode_id,
                step,
                event = %kind,
                "No recipients for notification"
            );
            return 0;
        }

        let now = clock.now();
        let message = kind.message(step, &record.step_name);
        let records: Vec<NotificationRecord> = recipients
            .into_iter()
            .map(|recipient| NotificationRecord {
                id: NotificationId::new(),
                recipient,
                episode_id: workflow.episode_id,
                step_number: step,
                kind,
                title: kind.title().to_string(),
                message: message.clone(),
                created_at: now,
                read: false,
            })
            .collect();

        match sink.insert_many(&records) {
            Ok(()) => {
                tracing::debug!(
                    episode = %workflow.episode_id,
                    step,
                    event = %kind,
                    count = records.len(),
                    "Notifications dispatched"
                );
                records.len()
            }
            Err(e) => {
                tracing::warn!(
                    sink = %sink.name(),
                    episode = %workflow.episode_id,
                    step,
                    event = %kind,
                    error = %e,
                    "Notification delivery failed"
                );
                0
            }
        }
    }
}

fn dedup(users: Vec<UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    users.into_iter().filter(|u| seen.insert(*u)).collect()
}
