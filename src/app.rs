//! Wires the engine to the file-backed stores under the state directory.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::collaborators::InMemoryWorkItems;
use crate::config::Config;
use crate::crew::{CrewFile, RoleResolver};
use crate::engine::{HookTable, WorkflowEngine};
use crate::notifications::{InMemoryNotificationSink, NotificationService};
use crate::store::InMemoryWorkflowStore;

/// Everything a CLI command or the REST server needs
pub struct App {
    pub config: Config,
    pub engine: Arc<WorkflowEngine>,
    pub work_items: Arc<InMemoryWorkItems>,
    pub notifications: Arc<InMemoryNotificationSink>,
    pub crew: Arc<CrewFile>,
}

impl App {
    /// Open every store under `config.state_path()`
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let state_dir = config.state_path();
        debug!(path = %state_dir.display(), "Opening state directory");

        let store = Arc::new(
            InMemoryWorkflowStore::open(&state_dir).context("Failed to open workflow store")?,
        );
        let work_items = Arc::new(
            InMemoryWorkItems::open(&state_dir).context("Failed to open work items")?,
        );
        let notifications = Arc::new(
            InMemoryNotificationSink::open(&state_dir)
                .context("Failed to open notifications")?,
        );
        let crew = Arc::new(CrewFile::open(&state_dir).context("Failed to load crew")?);

        let notifier = NotificationService::new(
            &config.notifications,
            notifications.clone(),
            RoleResolver::new(crew.clone()),
            clock.clone(),
        );
        let engine = WorkflowEngine::new(store, crew.clone(), work_items.clone())
            .with_clock(clock)
            .with_hooks(HookTable::standard(work_items.clone(), work_items.clone()))
            .with_notifier(notifier)
            .with_workflow_config(&config.workflow);

        Ok(Self {
            config,
            engine: Arc::new(engine),
            work_items,
            notifications,
            crew,
        })
    }
}
