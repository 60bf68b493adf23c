//! Drives the REST router end to end with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use showrunner::app::App;
use showrunner::config::Config;
use showrunner::rest::{build_router, ApiState};
use showrunner::types::{EpisodeId, ProgramId, UserId};

struct TestContext {
    _temp_dir: TempDir,
    router: Router,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        let app = App::open(config).expect("Failed to open app");
        let router = build_router(ApiState::from_app(&app));
        Self {
            _temp_dir: temp_dir,
            router,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn actor(role: &str) -> Value {
    json!({ "user_id": UserId::new(), "role": role })
}

#[tokio::test]
async fn health_and_step_catalog() {
    let ctx = TestContext::new();

    let (status, body) = ctx.send(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = ctx.send(Method::GET, "/api/v1/steps", None).await;
    assert_eq!(status, StatusCode::OK);
    let steps = body.as_array().unwrap();
    assert_eq!(steps.len(), 8);
    assert_eq!(steps[0]["name"], "Creative Submission");
}

#[tokio::test]
async fn workflow_lifecycle_over_http() {
    let ctx = TestContext::new();
    let episode = EpisodeId::new();
    let base = format!("/api/v1/episodes/{}/workflow", episode);

    let (status, body) = ctx
        .send(
            Method::POST,
            &base,
            Some(json!({ "program_id": ProgramId::new() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["steps"].as_array().unwrap().len(), 8);

    let (status, _) = ctx
        .send(
            Method::POST,
            &base,
            Some(json!({ "program_id": ProgramId::new() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("{}/steps/1/start", base),
            Some(json!({ "actor": actor("creative") })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("{}/steps/1/complete", base),
            Some(json!({ "actor": actor("creative"), "notes": "script locked" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["notes"], "script locked");

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("{}/steps/1/complete", base),
            Some(json!({ "actor": actor("creative") })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (status, body) = ctx.send(Method::GET, &base, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completion_percentage"], 13);
    assert_eq!(body["current_step"], 2);

    let (status, body) = ctx
        .send(
            Method::GET,
            &format!("/api/v1/episodes/{}/activity?limit=1", episode),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["action"], "step_completed");
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let ctx = TestContext::new();
    let episode = EpisodeId::new();
    let base = format!("/api/v1/episodes/{}/workflow", episode);
    ctx.send(
        Method::POST,
        &base,
        Some(json!({ "program_id": ProgramId::new() })),
    )
    .await;

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("{}/steps/6/complete", base),
            Some(json!({ "actor": actor("design") })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("{}/steps/6/reset", base),
            Some(json!({ "actor": actor("distribution_manager") })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pushed_work_item_status_is_reconciled_on_read() {
    let ctx = TestContext::new();
    let episode = EpisodeId::new();
    let base = format!("/api/v1/episodes/{}", episode);
    ctx.send(
        Method::POST,
        &format!("{}/workflow", base),
        Some(json!({ "program_id": ProgramId::new() })),
    )
    .await;

    let (status, _) = ctx
        .send(
            Method::PUT,
            &format!("{}/work-items/production", base),
            Some(json!({ "status": "completed", "completed_at": "2024-03-04T12:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .send(Method::GET, &format!("{}/workflow/history", base), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1]["status"], "completed");
    assert_eq!(body[1]["completed_at"], "2024-03-04T12:00:00Z");

    let (_, body) = ctx
        .send(Method::POST, &format!("{}/workflow/reconcile", base), None)
        .await;
    assert_eq!(body["corrected"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_episode_is_not_found() {
    let ctx = TestContext::new();
    let (status, body) = ctx
        .send(
            Method::GET,
            &format!("/api/v1/episodes/{}/workflow", EpisodeId::new()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
