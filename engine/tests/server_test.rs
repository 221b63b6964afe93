//! HTTP surface tests
//!
//! Requests go straight into the axum router with `oneshot`, no socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{store, ScriptedGenerator, APPROVE, FRONTEND_PLAN, SNAKE_PAGE};
use devteam_engine::db::Database;
use devteam_engine::server::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app_state(temp: &TempDir, replies: Vec<&str>, entry: &'static str) -> AppState {
    let sessions = store(temp, ScriptedGenerator::new(replies), entry, 10);
    AppState::new(Arc::new(sessions), vec!["ollama".to_string()], 16)
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_task(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tasks")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_status_endpoint() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app_state(&temp, vec![], "planner"), get("/api/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["active_sessions"], 0);
    assert_eq!(body["providers"], json!(["ollama"]));
}

#[tokio::test]
async fn test_submit_task_returns_response() {
    let temp = TempDir::new().unwrap();
    let state = app_state(
        &temp,
        vec!["[DECISION]\nEND\n[RESPONSE]\nHello from the team!"],
        "conversational_agent",
    );

    let (status, body) = send(state, post_task(json!({"user_input": "hi"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["final_response"], "Hello from the team!");
    assert_eq!(body["iterations"], 1);
}

#[tokio::test]
async fn test_blank_task_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(
        app_state(&temp, vec![], "planner"),
        post_task(json!({"task_text": "  "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must not be empty"));
}

#[tokio::test]
async fn test_failed_session_is_server_error() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(
        app_state(&temp, vec![], "planner"),
        post_task(json!({"task_text": "build a blog"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("planner"));
    assert!(body["session_id"].is_string());
}

#[tokio::test]
async fn test_generated_site_is_served() {
    let temp = TempDir::new().unwrap();
    let state = app_state(&temp, vec![FRONTEND_PLAN, SNAKE_PAGE, APPROVE], "planner");

    let (status, body) = send(
        state.clone(),
        post_task(json!({"task_text": "Build a snake game"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "approved");

    let session_id = body["session_id"].as_str().unwrap();
    let response = router(state)
        .oneshot(get(&format!("/outputs/{}/frontend/index.html", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<canvas"));
}

#[tokio::test]
async fn test_history_endpoint() {
    let temp = TempDir::new().unwrap();

    let (status, _) = send(app_state(&temp, vec![], "planner"), get("/api/history")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let db = Database::new(&temp.path().join("devteam.db")).await.unwrap();
    let sessions = store(
        &temp,
        ScriptedGenerator::new(["[DECISION]\nEND\n[RESPONSE]\nHi!"]),
        "conversational_agent",
        10,
    )
    .with_history(db.sessions());
    let state = AppState::new(Arc::new(sessions), vec![], 16).with_history(db.sessions());

    let (status, _) = send(state.clone(), post_task(json!({"task_text": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(state, get("/api/history?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    let recorded = body["sessions"].as_array().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0]["task"], "hello");
    assert_eq!(recorded[0]["outcome"], "completed");
}
