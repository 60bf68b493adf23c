//! Notification inbox endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::notifications::NotificationRecord;
use crate::rest::dto::NotificationQuery;
use crate::rest::state::ApiState;
use crate::types::UserId;

/// Notifications addressed to a user, newest first
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/notifications",
    tag = "Notifications",
    params(
        ("id" = Uuid, Path, description = "User id"),
        NotificationQuery
    ),
    responses(
        (status = 200, description = "Notifications", body = Vec<NotificationRecord>)
    )
)]
pub async fn for_user(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
    Query(query): Query<NotificationQuery>,
) -> Json<Vec<NotificationRecord>> {
    Json(state.notifications.for_recipient(id, query.unread_only))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::CrewDirectory;
    use crate::notifications::NotificationKind;
    use crate::rest::state::test_state_with;
    use crate::types::{EpisodeId, ProgramId, Role};

    #[tokio::test]
    async fn test_ready_notification_reaches_next_step_crew() {
        let program = ProgramId::new();
        let editor = UserId::new();
        let mut crew = CrewDirectory::new();
        crew.assign(program, Role::Editor, editor);
        let state = test_state_with(crew);

        let episode = EpisodeId::new();
        state.engine.initialize_workflow(episode, program, None).unwrap();
        state.engine.complete_step(episode, 4, None, None).unwrap();

        let Json(inbox) = for_user(
            State(state),
            Path(editor),
            Query(NotificationQuery::default()),
        )
        .await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::StepReady);
        assert_eq!(inbox[0].step_number, 5);
    }
}
