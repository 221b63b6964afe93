//! HTTP and WebSocket server
//!
//! # Endpoints
//!
//! - GET /ws - streaming channel: one submission in, deltas then `done` out
//! - POST /api/tasks - single-shot task execution
//! - GET /api/status - server status
//! - GET /api/history - recently finished sessions
//! - GET /outputs/* - generated artifacts

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sdk::events::{SessionOutcome, StreamEvent, TaskSubmission};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::db::sessions::SessionRepository;
use crate::orchestrator::SessionStore;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 200;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionStore>,
    history: Option<Arc<SessionRepository>>,
    providers: Arc<Vec<String>>,
    stream_buffer: usize,
}

impl AppState {
    pub fn new(sessions: Arc<SessionStore>, providers: Vec<String>, stream_buffer: usize) -> Self {
        Self {
            sessions,
            history: None,
            providers: Arc::new(providers),
            stream_buffer: stream_buffer.max(1),
        }
    }

    pub fn with_history(mut self, repository: SessionRepository) -> Self {
        self.history = Some(Arc::new(repository));
        self
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let outputs = ServeDir::new(state.sessions.artifact_store().output_root());

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/tasks", post(submit_task_handler))
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .nest_service("/outputs", outputs)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Server shutting down gracefully");
        })
        .await
        .context("Server error")?;

    Ok(())
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &StreamEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize stream event: {}", e);
            true
        }
    }
}

fn parse_submission(text: &str) -> Result<TaskSubmission, String> {
    match serde_json::from_str::<TaskSubmission>(text) {
        Ok(s) if !s.task_text.trim().is_empty() => Ok(s),
        Ok(_) => Err("task_text must not be empty".to_string()),
        Err(e) => Err(format!("Invalid submission: {}", e)),
    }
}

/// One connection may run several sessions, one at a time
async fn handle_websocket(socket: WebSocket, state: AppState) {
    tracing::info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let submission = match parse_submission(&text) {
            Ok(submission) => submission,
            Err(message) => {
                if !send_event(&mut sender, &StreamEvent::Error { message }).await {
                    break;
                }
                continue;
            }
        };

        let (tx, mut rx) = mpsc::channel(state.stream_buffer);
        let handle = state.sessions.open_submission(&submission);
        tracing::debug!(session_id = %handle.id(), "Streaming session started");
        tokio::spawn(async move {
            handle.run(Some(&tx)).await;
        });

        // Returning drops the receiver, which cancels the session at its next emit
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        if !send_event(&mut sender, &event).await {
                            tracing::info!("WebSocket send failed mid-session");
                            return;
                        }
                    }
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        tracing::info!("WebSocket client disconnected mid-session");
                        return;
                    }
                    Some(Ok(_)) => {
                        tracing::debug!("Ignoring message received while a session is running");
                    }
                },
            }
        }
    }

    tracing::info!("WebSocket connection closed");
}

async fn submit_task_handler(
    State(state): State<AppState>,
    Json(submission): Json<TaskSubmission>,
) -> Response {
    if submission.task_text.trim().is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "task_text must not be empty");
    }

    let handle = state.sessions.open_submission(&submission);
    let response = handle.run(None).await;

    if response.outcome == SessionOutcome::Failed {
        let message = response
            .error
            .clone()
            .unwrap_or_else(|| "Task failed".to_string());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": message, "session_id": response.session_id})),
        )
            .into_response();
    }

    Json(response).into_response()
}

async fn status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.sessions.active_count(),
        "providers": state.providers.as_ref(),
    }))
}

async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(repository) = &state.history else {
        return error_json(StatusCode::SERVICE_UNAVAILABLE, "Session history is disabled");
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match repository.recent(limit).await {
        Ok(records) => Json(json!({ "sessions": records })).into_response(),
        Err(e) => {
            tracing::error!("Failed to load session history: {:#}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load session history")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submission_accepts_aliases() {
        let submission = parse_submission(
            r#"{"user_input": "build a landing page", "file_names": ["hero.png"], "chat_history": ["User: hi"]}"#,
        )
        .unwrap();
        assert_eq!(submission.task_text, "build a landing page");
        assert_eq!(submission.attachment_references, vec!["hero.png".to_string()]);
        assert_eq!(submission.conversation_history.len(), 1);
    }

    #[test]
    fn test_parse_submission_rejects_blank_task() {
        let err = parse_submission(r#"{"task_text": "   "}"#).unwrap_err();
        assert!(err.contains("must not be empty"));
    }

    #[test]
    fn test_parse_submission_reports_bad_json() {
        let err = parse_submission("not json").unwrap_err();
        assert!(err.starts_with("Invalid submission"));
    }
}
