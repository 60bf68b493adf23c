//! REST API for episode workflows.
//!
//! Exposes the engine's operations, the activity log, notification inboxes,
//! and collaborator status ingestion over HTTP.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

/// Serve the generated OpenAPI document
async fn openapi_json() -> Result<impl IntoResponse, error::ApiError> {
    let body = ApiDoc::json().map_err(|e| error::ApiError::InternalError(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::health::status))
        .route("/api/v1/openapi.json", get(openapi_json))
        // Step catalog
        .route("/api/v1/steps", get(routes::steps::list))
        // Workflow endpoints
        .route(
            "/api/v1/episodes/:id/workflow",
            post(routes::episodes::initialize).get(routes::episodes::visualization),
        )
        .route(
            "/api/v1/episodes/:id/workflow/history",
            get(routes::episodes::history),
        )
        .route(
            "/api/v1/episodes/:id/workflow/reconcile",
            post(routes::episodes::reconcile),
        )
        .route(
            "/api/v1/episodes/:id/workflow/steps/:step/start",
            post(routes::episodes::start),
        )
        .route(
            "/api/v1/episodes/:id/workflow/steps/:step/complete",
            post(routes::episodes::complete),
        )
        .route(
            "/api/v1/episodes/:id/workflow/steps/:step/assignee",
            put(routes::episodes::assign),
        )
        .route(
            "/api/v1/episodes/:id/workflow/steps/:step/reset",
            post(routes::episodes::reset),
        )
        .route(
            "/api/v1/episodes/:id/workflow/steps/:step/notes",
            put(routes::episodes::notes),
        )
        // Activity endpoints
        .route(
            "/api/v1/episodes/:id/activity",
            get(routes::activity::for_episode),
        )
        .route(
            "/api/v1/programs/:id/activity",
            get(routes::activity::for_program),
        )
        // Collaborator work items
        .route(
            "/api/v1/episodes/:id/work-items",
            get(routes::work_items::list),
        )
        .route(
            "/api/v1/episodes/:id/work-items/:kind",
            put(routes::work_items::upsert),
        )
        // Notifications
        .route(
            "/api/v1/users/:id/notifications",
            get(routes::notifications::for_user),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server and run until `shutdown` resolves
pub async fn serve<F>(state: ApiState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("REST API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("REST API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::state::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_openapi_route() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/api/v1/episodes/{id}/workflow"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/issuetypes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
