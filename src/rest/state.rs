//! API state management for the REST server.

use std::sync::Arc;

use crate::app::App;
use crate::collaborators::InMemoryWorkItems;
use crate::config::Config;
use crate::engine::WorkflowEngine;
use crate::notifications::InMemoryNotificationSink;
use crate::rest::error::ApiError;
use crate::workflow::WorkflowError;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<WorkflowEngine>,
    /// Collaborator status ingestion target
    pub work_items: Arc<InMemoryWorkItems>,
    pub notifications: Arc<InMemoryNotificationSink>,
    pub config: Arc<Config>,
}

impl ApiState {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        work_items: Arc<InMemoryWorkItems>,
        notifications: Arc<InMemoryNotificationSink>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            work_items,
            notifications,
            config: Arc::new(config),
        }
    }

    pub fn from_app(app: &App) -> Self {
        Self::new(
            app.engine.clone(),
            app.work_items.clone(),
            app.notifications.clone(),
            app.config.clone(),
        )
    }

    /// Run a blocking engine call off the async runtime
    pub async fn with_engine<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&WorkflowEngine) -> Result<T, WorkflowError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || f(&engine)).await?;
        Ok(result?)
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> ApiState {
    test_state_with(crate::crew::CrewDirectory::new())
}

/// In-memory state with the standard hooks and notifications switched on
#[cfg(test)]
pub(crate) fn test_state_with(crew: crate::crew::CrewDirectory) -> ApiState {
    use crate::clock::SystemClock;
    use crate::crew::RoleResolver;
    use crate::engine::HookTable;
    use crate::notifications::NotificationService;
    use crate::store::InMemoryWorkflowStore;

    let config = Config::default();
    let crew = Arc::new(crew);
    let work_items = Arc::new(InMemoryWorkItems::new());
    let notifications = Arc::new(InMemoryNotificationSink::new());
    let clock = Arc::new(SystemClock);
    let notifier = NotificationService::new(
        &config.notifications,
        notifications.clone(),
        RoleResolver::new(crew.clone()),
        clock.clone(),
    );
    let engine = WorkflowEngine::new(
        Arc::new(InMemoryWorkflowStore::new()),
        crew,
        work_items.clone(),
    )
    .with_clock(clock)
    .with_hooks(HookTable::standard(work_items.clone(), work_items.clone()))
    .with_notifier(notifier);

    ApiState::new(Arc::new(engine), work_items, notifications, config)
}
