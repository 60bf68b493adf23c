//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::activity::{ActivityAction, ActivityEntry};
use crate::collaborators::{WorkItem, WorkKind, WorkSchedule};
use crate::config::NextStepPolicy;
use crate::engine::{HistoryEntry, StepView, WorkflowVisualization};
use crate::notifications::{NotificationKind, NotificationRecord};
use crate::reconcile::{ReconcileFailure, ReconcileReport};
use crate::rest::dto::{
    AssignUserRequest, CompleteStepRequest, HealthResponse, InitializeRequest, ResetStepRequest,
    StartStepRequest, StatusResponse, StepDefinitionResponse, UpdateNotesRequest, WorkItemUpdate,
};
use crate::rest::error::ErrorResponse;
use crate::types::{Actor, Role};
use crate::workflow::{EpisodeWorkflow, ProgressRecord, StepStatus};

/// OpenAPI documentation for the Showrunner REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Showrunner API",
        description = "Episode production workflow: step transitions, reconciliation with collaborator status, activity and notifications.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::status,
        // Step catalog
        crate::rest::routes::steps::list,
        // Workflow endpoints
        crate::rest::routes::episodes::initialize,
        crate::rest::routes::episodes::visualization,
        crate::rest::routes::episodes::history,
        crate::rest::routes::episodes::reconcile,
        crate::rest::routes::episodes::start,
        crate::rest::routes::episodes::complete,
        crate::rest::routes::episodes::assign,
        crate::rest::routes::episodes::reset,
        crate::rest::routes::episodes::notes,
        // Activity endpoints
        crate::rest::routes::activity::for_episode,
        crate::rest::routes::activity::for_program,
        // Work items
        crate::rest::routes::work_items::upsert,
        crate::rest::routes::work_items::list,
        // Notifications
        crate::rest::routes::notifications::for_user,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            StatusResponse,
            StepDefinitionResponse,
            EpisodeWorkflow,
            ProgressRecord,
            StepStatus,
            WorkflowVisualization,
            StepView,
            HistoryEntry,
            ReconcileReport,
            ReconcileFailure,
            ActivityEntry,
            ActivityAction,
            NotificationRecord,
            NotificationKind,
            WorkItem,
            WorkKind,
            WorkSchedule,
            NextStepPolicy,
            Role,
            Actor,
            ErrorResponse,
            // Request types
            InitializeRequest,
            StartStepRequest,
            CompleteStepRequest,
            AssignUserRequest,
            ResetStepRequest,
            UpdateNotesRequest,
            WorkItemUpdate,
        )
    ),
    tags(
        (name = "Health", description = "Health check and status endpoints"),
        (name = "Steps", description = "The ordered step catalog"),
        (name = "Workflow", description = "Episode workflow state and transitions"),
        (name = "Activity", description = "Audit trail of workflow changes"),
        (name = "Work Items", description = "Collaborator status ingestion"),
        (name = "Notifications", description = "Per-user notification inbox"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("Showrunner API"));
        assert!(spec.contains("/api/v1/health"));
        assert!(spec.contains("/api/v1/episodes/{id}/workflow/steps/{step}/complete"));
    }

    #[test]
    fn test_openapi_has_all_tags() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        for tag in ["Health", "Steps", "Workflow", "Activity", "Work Items", "Notifications"] {
            assert!(spec.contains(&format!("\"{}\"", tag)), "missing tag {}", tag);
        }
    }
}
