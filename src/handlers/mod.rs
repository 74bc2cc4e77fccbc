//! HTTP Request Handlers
//!
//! This module contains all HTTP request handlers organized by domain.

pub mod admin;
pub mod health;
pub mod problems;
pub mod submissions;
pub mod users;

use axum::{Router, middleware};

use crate::{middleware::logging_middleware, state::AppState};

/// Create all API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/submissions", submissions::routes())
        .nest("/problems", problems::routes())
        .nest("/users", users::routes())
        .nest("/admin", admin::routes())
        .layer(middleware::from_fn(logging_middleware))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::JudgeConfig,
        db::MemoryStore,
        services::{JudgeQueue, StatisticsService, SubmissionService},
        test_utils::{ScriptedSandbox, echo_problem, test_config},
    };

    struct TestApp {
        router: Router,
        state: AppState,
        problem_id: Uuid,
        // Keeps the queue open
        _rx: tokio::sync::mpsc::Receiver<Uuid>,
    }

    fn app_with(judge: JudgeConfig) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let problem = echo_problem(2, 1);
        let problem_id = problem.id;
        store.insert_problem(problem);

        let (queue, rx) = JudgeQueue::bounded(judge.queue_capacity);
        let statistics = Arc::new(StatisticsService::new(store.clone(), store.clone()));
        let service = Arc::new(SubmissionService::new(
            store.clone(),
            store.clone(),
            statistics,
            Arc::new(ScriptedSandbox::new()),
            queue,
            judge,
        ));
        let state = AppState::new(service, store, test_config());
        let router = Router::new()
            .nest("/api/v1", routes())
            .with_state(state.clone());

        TestApp {
            router,
            state,
            problem_id,
            _rx: rx,
        }
    }

    fn app() -> TestApp {
        app_with(JudgeConfig::default())
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn submission(problem_id: Uuid, language: &str, source: &str) -> Value {
        json!({
            "user_id": Uuid::new_v4(),
            "problem_id": problem_id,
            "language": language,
            "source_code": source,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app.router, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sandbox"], "process");
        assert_eq!(body["queue_depth"], 0);
    }

    #[tokio::test]
    async fn test_submit_then_poll_until_judged() {
        let app = app();
        let (status, body) = send(
            &app.router,
            post(
                "/api/v1/submissions",
                submission(app.problem_id, "python", "echo"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");

        let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
        let uri = format!("/api/v1/submissions/{}/status", id);

        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_complete"], false);
        assert!(body["judged_at"].is_null());

        app.state.submissions().process(id).await;

        let (_, body) = send(&app.router, get(&uri)).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["label"], "Accepted");
        assert_eq!(body["is_complete"], true);
        assert_eq!(body["test_summary"]["passed"], 3);
        assert!(body["judged_at"].is_string());
    }

    #[tokio::test]
    async fn test_unsupported_language_is_bad_request() {
        let app = app();
        let (status, body) = send(
            &app.router,
            post(
                "/api/v1/submissions",
                submission(app.problem_id, "brainfuck", "+"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_LANGUAGE");
    }

    #[tokio::test]
    async fn test_empty_source_fails_validation() {
        let app = app();
        let (status, body) = send(
            &app.router,
            post("/api/v1/submissions", submission(app.problem_id, "python", "")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_submission_is_not_found() {
        let app = app();
        let uri = format!("/api/v1/submissions/{}/status", Uuid::new_v4());
        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_full_queue_is_too_many_requests() {
        let app = app_with(JudgeConfig {
            queue_capacity: 1,
            ..JudgeConfig::default()
        });
        let request = || {
            post(
                "/api/v1/submissions",
                submission(app.problem_id, "python", "echo"),
            )
        };

        let (status, _) = send(&app.router, request()).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&app.router, request()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "QUEUE_FULL");
    }

    #[tokio::test]
    async fn test_run_code_preview() {
        let app = app();
        let uri = format!("/api/v1/problems/{}/run", app.problem_id);
        let (status, body) = send(
            &app.router,
            post(&uri, json!({ "language": "python", "source_code": "echo" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["status"], "All Passed");
        assert_eq!(body["summary"]["total_tests"], 2);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_statistics_and_dead_letter_endpoints() {
        let app = app();

        let uri = format!("/api/v1/users/{}/stats", Uuid::new_v4());
        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_submissions"], 0);
        assert_eq!(body["acceptance_rate"], 0.0);

        let uri = format!("/api/v1/problems/{}/stats", app.problem_id);
        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["solved_by"], 0);

        let (status, body) = send(&app.router, get("/api/v1/admin/dead-letters")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }
}
